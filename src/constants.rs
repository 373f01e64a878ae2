//! Constants definition module
//!
//! Centralizes constants used throughout the application.
//! This improves maintainability by requiring changes in only one place.

use std::path::PathBuf;

/// Application basic settings
pub const APP_NAME: &str = "bifrost";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default listen address used when no config file (or no `listen` key)
/// is found.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Protocol classifier settings
///
/// The classifier peeks at most this many bytes before deciding between
/// the L4 and L7 path. Six HTTP methods plus a trailing space all fit
/// well within it ("OPTIONS " is the longest at 8 bytes).
pub const CLASSIFY_PEEK_BYTES: usize = 16;

/// Health check settings
pub const HEALTH_CHECK_CONNECT_TIMEOUT_SECS: u64 = 2;
pub const HEALTH_CHECK_SWEEP_INTERVAL_SECS: u64 = 3;

/// Load imbalance threshold used by SelectAlgorithm: max - min ActiveCount.
pub const LOAD_IMBALANCE_THRESHOLD: usize = 5;

/// Connection settings
///
/// No backend dial timeout is externally mandated; this bound keeps a
/// stalled dial from pinning a connection task forever.
pub const BACKEND_DIAL_TIMEOUT_SECS: u64 = 5;

/// Graceful shutdown settings
///
/// Maximum time to wait for existing connections to complete.
/// Forces shutdown after this time to prevent infinite waits.
pub const GRACEFUL_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// File and directory settings
pub const PID_FILENAME: &str = "bifrost.pid";
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Configuration file priority (higher = more priority)
/// 1. Path specified via CLI argument
/// 2. $HOME/.bifrost/config.yaml
/// 3. /etc/bifrost/config.yaml
pub fn get_home_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".bifrost").join(CONFIG_FILENAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME))
}

pub fn get_system_config_path() -> PathBuf {
    PathBuf::from("/etc/bifrost").join(CONFIG_FILENAME)
}

/// PID file path ($HOME/.bifrost/bifrost.pid)
pub fn get_pid_file_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".bifrost").join(PID_FILENAME))
        .unwrap_or_else(|| PathBuf::from(PID_FILENAME))
}

/// Runtime directory path ($HOME/.bifrost/)
pub fn get_runtime_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".bifrost"))
        .unwrap_or_else(|| PathBuf::from("."))
}
