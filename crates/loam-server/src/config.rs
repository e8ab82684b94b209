const DEFAULT_ADDR: &str = "0.0.0.0:9700";
const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    /// Frames above this size close the connection.
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ServerConfig {
    /// Read `LOAM_ADDR` and `LOAM_MAX_MESSAGE_BYTES`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: std::env::var("LOAM_ADDR").unwrap_or(defaults.addr),
            max_message_bytes: std::env::var("LOAM_MAX_MESSAGE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_message_bytes),
        }
    }
}
