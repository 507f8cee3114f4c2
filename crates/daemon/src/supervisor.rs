// SPDX-License-Identifier: MIT

//! Owns the set `sid -> RuntimeWorker`. A single non-reentrant
//! `tokio::sync::Mutex` (`workerLock`) serializes every public operation
//! and every mutation of the worker map; an async mutex is required
//! (rather than `parking_lot`) because these operations span `.await`
//! points while the state store is read or written.
//!
//! Every internal helper below that assumes the lock is already held is
//! named with an `_locked` suffix and documented as such; only the public
//! methods acquire the lock, so no caller can self-deadlock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mb_core::{ServiceError, UserRegistration};
use mb_storage::StateStore;
use mb_wire::{Response, ResponseStatus};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::identity::IdentityResolver;
use crate::worker::{RuntimeWorker, WorkerState};

const RETRY_INTERVAL: Duration = Duration::from_secs(60);

pub struct Supervisor {
    store: Arc<StateStore>,
    identity: Arc<dyn IdentityResolver>,
    workers: Mutex<HashMap<String, RuntimeWorker>>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(store: Arc<StateStore>, identity: Arc<dyn IdentityResolver>) -> Arc<Self> {
        Arc::new(Self { store, identity, workers: Mutex::new(HashMap::new()), shutdown: CancellationToken::new() })
    }

    /// On service start, read the state store and attempt to start a
    /// worker for every registration, continuing past individual failures.
    pub async fn start_all_from_state(self: &Arc<Self>) -> Result<(), ServiceError> {
        let config = self.store.load().await?;
        let mut workers = self.workers.lock().await;
        for registration in config.registered_users {
            if let Err(e) = self.start_worker_locked(&mut workers, registration.clone()).await {
                warn!(sid = %registration.sid, error = %e, "failed to start worker at service startup");
                if matches!(e, ServiceError::IdentityUnresolved) {
                    self.schedule_retry(registration);
                }
            }
        }
        Ok(())
    }

    pub async fn register(self: &Arc<Self>, sid: &str, username: &str, config_path: &str) -> Response {
        let mut workers = self.workers.lock().await;

        let config = match self.store.load().await {
            Ok(c) => c,
            Err(e) => return e.into(),
        };
        if config.contains(sid) {
            return ServiceError::AlreadyRegistered.into();
        }

        if self.identity.resolve(sid).await.is_none() {
            return ServiceError::IdentityUnresolved.into();
        }

        let registration = UserRegistration {
            sid: sid.to_string(),
            username: username.to_string(),
            config_path: std::path::PathBuf::from(config_path),
            registered_at: chrono::Utc::now(),
        };

        let mut config = config;
        config.registered_users.push(registration.clone());
        if let Err(e) = self.store.save(&config).await {
            return e.into();
        }

        if let Err(e) = self.start_worker_locked(&mut workers, registration.clone()).await {
            warn!(sid, error = %e, "worker failed to start after registration, will retry");
            if matches!(e, ServiceError::IdentityUnresolved) {
                self.schedule_retry(registration);
            }
        }

        Response::success_final(format!("Registered {sid}"))
    }

    pub async fn unregister(&self, sid: &str, _username: &str) -> Response {
        let mut workers = self.workers.lock().await;

        let mut config = match self.store.load().await {
            Ok(c) => c,
            Err(e) => return e.into(),
        };
        if !config.contains(sid) {
            return ServiceError::NotRegistered.into();
        }

        let timeout = Duration::from_secs(config.worker_shutdown_timeout_seconds);
        if let Some(worker) = workers.remove(sid) {
            if !worker.shutdown(timeout).await {
                warn!(sid, "worker did not shut down within its grace period");
            }
        }

        config.remove(sid);
        if let Err(e) = self.store.save(&config).await {
            return e.into();
        }

        Response::success_final(format!("Unregistered {sid}"))
    }

    pub async fn status(&self, sid: &str, _username: &str) -> Response {
        let workers = self.workers.lock().await;

        let config = match self.store.load().await {
            Ok(c) => c,
            Err(e) => return e.into(),
        };
        let Some(registration) = config.find(sid) else {
            return Response::info(format!("Not registered: {sid}"));
        };

        let running = workers.get(sid).map(|w| w.state() == WorkerState::Running).unwrap_or(false);
        let message = format!(
            "Registered: Yes\nConfig: {}\nWorker: {}\nRegistered At: {}",
            registration.config_path.display(),
            if running { "Running" } else { "Stopped" },
            registration.registered_at.to_rfc3339(),
        );
        Response { status: ResponseStatus::Success, message, is_final: true, validation_errors: None }
    }

    /// Shuts down every running worker in parallel, each with a deadline
    /// of `workerShutdownTimeoutSeconds`, and signals any pending retry
    /// loops to stop.
    pub async fn shutdown_all(&self) {
        self.shutdown.cancel();
        let timeout_secs = self.store.load().await.map(|c| c.worker_shutdown_timeout_seconds).unwrap_or(60);
        let timeout = Duration::from_secs(timeout_secs);

        let mut workers = self.workers.lock().await;
        let drained: Vec<_> = workers.drain().collect();
        drop(workers);

        let handles: Vec<_> = drained
            .into_iter()
            .map(|(sid, worker)| {
                tokio::spawn(async move {
                    if !worker.shutdown(timeout).await {
                        warn!(sid, "worker did not shut down within its grace period");
                    }
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Assumes `workers` is already locked. Resolves identity and spawns a
    /// `RuntimeWorker`, inserting it into the map on success.
    async fn start_worker_locked(
        &self,
        workers: &mut MutexGuard<'_, HashMap<String, RuntimeWorker>>,
        registration: UserRegistration,
    ) -> Result<(), ServiceError> {
        let identity = self.identity.resolve(&registration.sid).await.ok_or(ServiceError::IdentityUnresolved)?;
        let worker = RuntimeWorker::spawn(registration.clone(), identity.home_directory)
            .map_err(|e| ServiceError::Io(e.to_string()))?;
        info!(sid = %registration.sid, "worker started");
        workers.insert(registration.sid, worker);
        Ok(())
    }

    /// Schedules an indefinite 60s-interval retry for a registration whose
    /// worker failed to start because identity resolution returned `None`.
    /// Re-acquires `workerLock` on every attempt; never calls itself while
    /// already holding it.
    fn schedule_retry(self: &Arc<Self>, registration: UserRegistration) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_INTERVAL) => {}
                    _ = this.shutdown.cancelled() => return,
                }
                let mut workers = this.workers.lock().await;
                if workers.contains_key(&registration.sid) {
                    return;
                }
                match this.start_worker_locked(&mut workers, registration.clone()).await {
                    Ok(()) => return,
                    Err(ServiceError::IdentityUnresolved) => continue,
                    Err(e) => {
                        warn!(sid = %registration.sid, error = %e, "worker retry failed with a non-retryable error");
                        return;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
