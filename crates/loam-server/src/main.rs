use loam_server::{Catalog, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = Server::new(Catalog::new(), ServerConfig::from_env());
    if let Err(e) = server.serve() {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
