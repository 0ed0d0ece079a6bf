//! Agent configuration.
//!
//! Environment variables override compiled defaults; the detection ruleset
//! can additionally be loaded from a JSON file (see `detection::ruleset`).

use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::Lazy;

/// Default triage server address for the stream transport.
pub const DEFAULT_STREAM_ADDR: &str = "127.0.0.1:8080";

/// Default triage server base URL for the poll transport and heartbeat.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:7777";

/// Seconds between scan cycles.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 10;

/// Seconds between decision pickups on the poll transport.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Fixed reconnect delay after a lost transport link.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Seconds between liveness pings.
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Bounded capacity of the engine -> transport queue. When full the scan
/// loop blocks; suspicion events are never dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 1000;

static AGENT_IDENTITY: Lazy<String> = Lazy::new(|| {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
});

/// Stable identity this agent reports to the server (the machine hostname).
pub fn agent_identity() -> &'static str {
    &AGENT_IDENTITY
}

/// Which transport shape to assemble at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFlavor {
    /// Persistent line-oriented TCP stream.
    Stream,
    /// HTTP request/response with periodic decision pickup.
    Poll,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub transport: TransportFlavor,
    pub stream_addr: String,
    pub server_url: String,
    pub scan_interval: Duration,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub heartbeat_interval: Duration,
    pub ruleset_path: Option<PathBuf>,
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            transport: match std::env::var("PROCSENTRY_TRANSPORT").as_deref() {
                Ok("poll") => TransportFlavor::Poll,
                _ => TransportFlavor::Stream,
            },

            stream_addr: std::env::var("PROCSENTRY_STREAM_ADDR")
                .unwrap_or_else(|_| DEFAULT_STREAM_ADDR.to_string()),

            server_url: std::env::var("PROCSENTRY_SERVER_URL")
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),

            scan_interval: Duration::from_secs(env_secs(
                "PROCSENTRY_SCAN_INTERVAL",
                DEFAULT_SCAN_INTERVAL_SECS,
            )),

            poll_interval: Duration::from_secs(env_secs(
                "PROCSENTRY_POLL_INTERVAL",
                DEFAULT_POLL_INTERVAL_SECS,
            )),

            retry_delay: Duration::from_secs(env_secs(
                "PROCSENTRY_RETRY_DELAY",
                DEFAULT_RETRY_DELAY_SECS,
            )),

            heartbeat_interval: Duration::from_secs(env_secs(
                "PROCSENTRY_HEARTBEAT_INTERVAL",
                DEFAULT_HEARTBEAT_INTERVAL_SECS,
            )),

            ruleset_path: std::env::var("PROCSENTRY_RULESET").ok().map(PathBuf::from),
        }
    }
}

fn env_secs(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
