// SPDX-License-Identifier: MIT

//! Per-machine backup service: the worker supervisor, the IPC server, and
//! the backup execution engine.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config_watch;
pub mod engine;
pub mod env;
pub mod identity;
pub mod lifecycle;
pub mod listener;
pub mod logging;
pub mod supervisor;
pub mod worker;

pub use identity::{Identity, IdentityResolver, OsIdentityResolver};
pub use supervisor::Supervisor;
pub use worker::{RuntimeWorker, WorkerState};
