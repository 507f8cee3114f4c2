// SPDX-License-Identifier: MIT

//! One worker per registered user: loads the user's config (with hot
//! reload), runs the backup engine in a loop with interval and error
//! backoff, and owns the user's per-worker log sink.

use std::path::PathBuf;
use std::time::Duration;

use mb_core::UserRegistration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config_watch;
use crate::engine;
use crate::logging::UserLogSink;

const CYCLE_INTERVAL: Duration = Duration::from_secs(10);
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// In-memory handle to a running user's backup loop. Holds only a
/// shutdown signal and the task itself — never a back-pointer to the
/// supervisor, so no ownership cycle exists between the two.
pub struct RuntimeWorker {
    pub registration: UserRegistration,
    pub home_directory: PathBuf,
    shutdown: CancellationToken,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
}

impl RuntimeWorker {
    pub fn spawn(registration: UserRegistration, home_directory: PathBuf) -> std::io::Result<Self> {
        let log = UserLogSink::open(&home_directory)?;
        let config_rx = config_watch::spawn(registration.config_path.clone(), home_directory.clone());
        let shutdown = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(WorkerState::Starting);

        let task_shutdown = shutdown.clone();
        let sid = registration.sid.clone();
        let task = tokio::spawn(backup_loop(sid, config_rx, log, task_shutdown, state_tx));

        Ok(Self { registration, home_directory, shutdown, state: state_rx, task })
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Signals shutdown and waits up to `timeout` for the loop to finish
    /// its current file and exit.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.shutdown.cancel();
        tokio::time::timeout(timeout, self.task).await.is_ok()
    }
}

async fn backup_loop(
    sid: String,
    mut config_rx: watch::Receiver<Vec<mb_core::ResolvedJob>>,
    log: UserLogSink,
    shutdown: CancellationToken,
    state_tx: watch::Sender<WorkerState>,
) {
    let _ = state_tx.send(WorkerState::Running);

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let jobs = config_rx.borrow_and_update().clone();
        log.sweep_retention();

        let cycle_result = run_cycle(&sid, &jobs, &shutdown, &log).await;

        if shutdown.is_cancelled() {
            break;
        }

        let sleep_for = if cycle_result.is_err() { ERROR_BACKOFF } else { CYCLE_INTERVAL };
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    let _ = state_tx.send(WorkerState::Stopping);
    let _ = state_tx.send(WorkerState::Stopped);
}

/// Runs every job in the current snapshot once, sequentially. Spawned as
/// its own task so an unexpected panic inside the engine is caught here
/// (as "any unhandled exception") rather than taking the worker down.
async fn run_cycle(
    sid: &str,
    jobs: &[mb_core::ResolvedJob],
    shutdown: &CancellationToken,
    log: &UserLogSink,
) -> Result<(), ()> {
    for job in jobs {
        if shutdown.is_cancelled() {
            break;
        }
        let job = job.clone();
        let cancel = shutdown.clone();
        let handle = tokio::spawn(async move { engine::run_job(&job, &cancel).await });

        match handle.await {
            Ok(summary) => {
                if summary.error_count > 0 || summary.missing_count > 0 {
                    log.warn(&format!(
                        "job completed with {} errors, {} missing files",
                        summary.error_count, summary.missing_count
                    ));
                } else {
                    log.info(&format!(
                        "job completed: {} copied, {} up to date",
                        summary.backup_count, summary.up_to_date_count
                    ));
                }
            }
            Err(join_err) => {
                warn!(sid, error = %join_err, "backup job task failed unexpectedly");
                log.error("backup job task failed unexpectedly");
                return Err(());
            }
        }
    }
    info!(sid, "backup cycle complete");
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
