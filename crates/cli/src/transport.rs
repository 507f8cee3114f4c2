// SPDX-License-Identifier: MIT

//! Connects to the daemon's IPC endpoint and drives one request/response
//! conversation to completion.

use std::path::PathBuf;
use std::time::Duration;

use mb_wire::{read_message, write_message, Request, Response, ResponseStatus};
use tokio::net::UnixStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// `MAXBACKUP_STATE_DIR` mirrors the daemon's own override, so a test can
/// point both ends of the pipe at the same relocated state directory.
pub fn socket_path() -> PathBuf {
    let state_dir = std::env::var("MAXBACKUP_STATE_DIR").unwrap_or_else(|_| "/var/lib/maxbackup".to_string());
    PathBuf::from(state_dir).join("MaxBackupPipe.sock")
}

/// Sends `request` and prints every response message as it arrives, in
/// order. Returns the process exit code implied by the final response:
/// `0` for `Success`, `1` for `Error`.
pub async fn run_conversation(request: Request) -> anyhow::Result<i32> {
    let path = socket_path();
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(&path))
        .await
        .map_err(|_| anyhow::anyhow!("timed out connecting to {}", path.display()))?
        .map_err(|e| anyhow::anyhow!("cannot connect to {}: {e}", path.display()))?;

    write_message(&mut stream, &request, MESSAGE_TIMEOUT).await?;

    loop {
        let response: Response = read_message(&mut stream, MESSAGE_TIMEOUT).await?;
        println!("{}", response.message);
        if let Some(errors) = &response.validation_errors {
            for error in errors {
                println!("  {}: {}", error.field, error.error);
            }
        }
        if response.is_final {
            return Ok(match response.status {
                ResponseStatus::Error => 1,
                _ => 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn socket_path_honors_state_dir_override() {
        std::env::set_var("MAXBACKUP_STATE_DIR", "/tmp/maxbackup-test-state");
        assert_eq!(socket_path(), PathBuf::from("/tmp/maxbackup-test-state/MaxBackupPipe.sock"));
        std::env::remove_var("MAXBACKUP_STATE_DIR");
    }

    #[test]
    #[serial]
    fn socket_path_defaults_without_override() {
        std::env::remove_var("MAXBACKUP_STATE_DIR");
        assert_eq!(socket_path(), PathBuf::from("/var/lib/maxbackup/MaxBackupPipe.sock"));
    }
}
