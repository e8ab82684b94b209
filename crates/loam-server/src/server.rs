use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use signal_hook::consts::SIGTERM;
use signal_hook::flag;

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::protocol::{FrameError, Request, read_frame, write_frame};
use crate::session::Session;

pub struct Server {
    catalog: Arc<Catalog>,
    config: ServerConfig,
    shutdown: Arc<AtomicBool>,
}

impl Server {
    pub fn new(catalog: Catalog, config: ServerConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the accept loop once set. SIGTERM sets it too.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn serve(&self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(&self.config.addr)?;
        tracing::info!(addr = %self.config.addr, "loam-server listening");

        flag::register(SIGTERM, Arc::clone(&self.shutdown))?;

        // Non-blocking accept so the shutdown flag is polled.
        listener.set_nonblocking(true)?;

        // Read halves of live connections, removed by each handler on exit.
        let connections: Arc<Mutex<HashMap<u64, TcpStream>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let mut handles: Vec<thread::JoinHandle<()>> = Vec::new();
        let mut next_id = 0u64;

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    stream.set_nonblocking(false)?;
                    let id = next_id;
                    next_id += 1;
                    let read_half = stream.try_clone()?;
                    connections.lock().unwrap().insert(id, read_half);

                    let catalog = Arc::clone(&self.catalog);
                    let live = Arc::clone(&connections);
                    let max_len = self.config.max_message_bytes;
                    handles.retain(|h| !h.is_finished());
                    handles.push(thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, catalog, max_len) {
                            tracing::warn!(%peer, error = %e, "connection error");
                        }
                        live.lock().unwrap().remove(&id);
                        tracing::debug!(%peer, "connection closed");
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                }
            }
        }

        tracing::info!("shutdown requested, draining connections");

        // Closing the read half ends each handler at its next frame.
        for stream in connections.lock().unwrap().values() {
            let _ = stream.shutdown(Shutdown::Read);
        }
        for handle in handles {
            let _ = handle.join();
        }

        tracing::info!("shutdown complete");
        Ok(())
    }
}

fn handle_connection(
    stream: TcpStream,
    catalog: Arc<Catalog>,
    max_len: usize,
) -> Result<(), FrameError> {
    let session = Session::new(catalog);
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    while let Some(request) = read_frame::<_, Request>(&mut reader, max_len)? {
        let response = session.handle(request);
        write_frame(&mut writer, &response)?;
    }
    Ok(())
}
