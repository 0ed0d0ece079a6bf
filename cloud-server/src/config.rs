//! Configuration module

use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API port (poll transport + operator interface)
    pub http_port: u16,

    /// TCP port for the stream transport
    pub stream_port: u16,

    /// Seconds without a ping before an agent counts as offline
    pub liveness_window_secs: i64,

    /// Append-only audit log file
    pub audit_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            http_port: env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(7777),

            stream_port: env::var("STREAM_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),

            liveness_window_secs: env::var("LIVENESS_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            audit_path: env::var("AUDIT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("audit.log")),
        }
    }
}
