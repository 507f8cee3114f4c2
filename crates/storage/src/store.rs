// SPDX-License-Identifier: MIT

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use mb_core::{ServiceConfig, ServiceError};
use tokio::sync::Mutex;
use tracing::warn;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_millis(1000);
const LOCK_BUDGET: Duration = Duration::from_secs(15);

/// Durable `ServiceConfig` store at `{path}`. `load`/`save` are serialized
/// in-process by `lock` and, across processes, by an `fs2` advisory lock on
/// the state file itself.
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    /// Loads the config, creating the file with defaults if it does not
    /// exist yet. Exclusive with every other `load`/`save` call.
    pub async fn load(&self) -> Result<ServiceConfig, ServiceError> {
        let _guard = self.lock.lock().await;
        self.load_locked().await
    }

    /// Overwrites the persisted config. Exclusive with every other
    /// `load`/`save` call.
    pub async fn save(&self, config: &ServiceConfig) -> Result<(), ServiceError> {
        let _guard = self.lock.lock().await;
        self.save_locked(config).await
    }

    /// Internal variant of `load` that assumes the in-process lock is
    /// already held. Only `load` itself may call this; it exists so `load`
    /// can write initial defaults via `save_locked` without self-deadlock.
    async fn load_locked(&self) -> Result<ServiceConfig, ServiceError> {
        let path = self.path.clone();
        let exists = path.exists();
        if !exists {
            let defaults = ServiceConfig::default();
            self.save_locked(&defaults).await?;
            return Ok(defaults);
        }

        let path_for_read = path.clone();
        let text = tokio::task::spawn_blocking(move || read_with_lock(&path_for_read))
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))??;

        serde_json::from_str(&text)
            .map_err(|e| ServiceError::Io(format!("malformed service state at {}: {e}", path.display())))
    }

    /// Internal variant of `save` that assumes the in-process lock is
    /// already held. Callers outside this module must go through `save`.
    async fn save_locked(&self, config: &ServiceConfig) -> Result<(), ServiceError> {
        let path = self.path.clone();
        let body = serde_json::to_string_pretty(config)
            .map_err(|e| ServiceError::Io(format!("failed to encode service state: {e}")))?;

        tokio::task::spawn_blocking(move || write_with_lock(&path, &body))
            .await
            .map_err(|e| ServiceError::Io(e.to_string()))?
    }
}

fn read_with_lock(path: &Path) -> Result<String, ServiceError> {
    let mut file = std::fs::OpenOptions::new().read(true).open(path)?;
    let _lock = acquire_with_backoff(&file)?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    FileExt::unlock(&file)?;
    Ok(text)
}

fn write_with_lock(path: &Path, body: &str) -> Result<(), ServiceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().read(true).write(true).create(true).open(path)?;
    let _lock = acquire_with_backoff(&file)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(body.as_bytes())?;
    file.flush()?;
    FileExt::unlock(&file)?;
    Ok(())
}

/// Retries `try_lock_exclusive` with exponential backoff (100ms, doubling,
/// capped at 1000ms) until it succeeds or 15s of wall-clock time elapses.
fn acquire_with_backoff(file: &std::fs::File) -> Result<(), ServiceError> {
    let start = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(_) if start.elapsed() >= LOCK_BUDGET => {
                warn!("timed out acquiring service-state file lock after {:?}", start.elapsed());
                return Err(ServiceError::Timeout);
            }
            Err(_) => {
                std::thread::sleep(backoff.min(LOCK_BUDGET - start.elapsed()));
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
