use std::time::Duration;

use super::RequestsLoggingLevel;
use crate::play_tracking::DEFAULT_PLAY_THRESHOLD;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    pub metrics_port: u16,
    /// Advertised to clients, which count a play after this long.
    pub play_threshold: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            play_threshold: DEFAULT_PLAY_THRESHOLD,
        }
    }
}
