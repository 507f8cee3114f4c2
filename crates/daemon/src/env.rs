// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Directory holding the service state file, the IPC socket, and service
/// logs. `MAXBACKUP_STATE_DIR` > the platform default, so tests can
/// relocate every piece of durable state without touching `/var/lib`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MAXBACKUP_STATE_DIR") {
        return PathBuf::from(dir);
    }
    PathBuf::from("/var/lib/maxbackup")
}

pub fn socket_path() -> PathBuf {
    state_dir().join("MaxBackupPipe.sock")
}

pub fn config_path() -> PathBuf {
    state_dir().join("config.json")
}

pub fn log_dir() -> PathBuf {
    state_dir().join("logs")
}

/// Fallback `pipeTimeoutSeconds` used until the service state file has been
/// loaded (e.g. while accepting the very first connection at startup).
pub fn default_pipe_timeout() -> Duration {
    std::env::var("MAXBACKUP_PIPE_TIMEOUT_SECONDS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(30))
}
