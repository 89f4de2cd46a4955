use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_STATIC_DIR: &str = "crates/popform/static";
const DEFAULT_HEARTBEAT_MS: u64 = 5_000;
const DEFAULT_ACK_GRACE_MS: u64 = 100;

/// Tunables for one form session. The listener address is not configurable:
/// sessions always bind 127.0.0.1 on an OS-assigned port.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub static_dir: PathBuf,
    pub log_filter: String,
    /// Interval between `heartbeat` events on the disconnect stream.
    pub heartbeat_interval: Duration,
    /// Delay between acknowledging a submission and tearing the listener
    /// down, so the UI's own request does not fail on a closed socket.
    pub ack_grace: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let static_dir = env::var("POPFORM_STATIC_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let log_filter = env::var("POPFORM_LOG_FILTER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let heartbeat_ms = env::var("POPFORM_HEARTBEAT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_HEARTBEAT_MS)
            .max(100);

        let ack_grace_ms = env::var("POPFORM_ACK_GRACE_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_ACK_GRACE_MS);

        Self {
            static_dir,
            log_filter,
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
            ack_grace: Duration::from_millis(ack_grace_ms),
        }
    }
}

#[cfg(test)]
impl ServerConfig {
    /// Short timers so disconnect detection and teardown settle quickly in
    /// tests.
    #[must_use]
    pub fn for_tests(static_dir: PathBuf) -> Self {
        Self {
            static_dir,
            log_filter: "debug".to_string(),
            heartbeat_interval: Duration::from_millis(50),
            ack_grace: Duration::from_millis(25),
        }
    }
}
