// SPDX-License-Identifier: MIT

//! Daemon startup: prepares the state directory, binds the IPC socket with
//! its access-control bits, and starts a worker for every already
//! registered user.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use mb_storage::StateStore;
use tokio::net::UnixListener;
use tracing::info;

use crate::env;
use crate::identity::{IdentityResolver, OsIdentityResolver};
use crate::listener::{ListenCtx, Listener};
use crate::supervisor::Supervisor;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start workers from saved state: {0}")]
    Startup(#[from] mb_core::ServiceError),
}

pub struct StartupResult {
    pub listener: Listener,
    pub supervisor: Arc<Supervisor>,
    pub socket_path: PathBuf,
}

pub async fn startup() -> Result<StartupResult, LifecycleError> {
    let state_dir = env::state_dir();
    std::fs::create_dir_all(&state_dir)?;
    set_world_accessible(&state_dir)?;

    let store = Arc::new(StateStore::new(env::config_path()));
    let identity: Arc<dyn IdentityResolver> = Arc::new(OsIdentityResolver);
    let supervisor = Supervisor::new(store.clone(), identity.clone());

    supervisor.start_all_from_state().await?;

    let socket_path = env::socket_path();
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    let socket = UnixListener::bind(&socket_path)?;
    set_world_accessible(&socket_path)?;

    info!(socket = %socket_path.display(), "IPC endpoint ready");

    let ctx = Arc::new(ListenCtx { supervisor: supervisor.clone(), identity, store });
    Ok(StartupResult { listener: Listener::new(socket, ctx), supervisor, socket_path })
}

/// Translates the spec's three-principal Windows named-pipe ACL (any local
/// user, the machine administrator, the service principal) onto POSIX
/// permission bits: "any local user" becomes world read+write, since Unix
/// has no native per-connection ACL primitive for a domain socket.
fn set_world_accessible(path: &std::path::Path) -> std::io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o777);
    std::fs::set_permissions(path, perms)
}

pub async fn shutdown(supervisor: &Supervisor, socket_path: &std::path::Path) {
    supervisor.shutdown_all().await;
    let _ = std::fs::remove_file(socket_path);
}
