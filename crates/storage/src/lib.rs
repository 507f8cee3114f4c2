// SPDX-License-Identifier: MIT

//! Durable store for `ServiceConfig`: a pretty-printed JSON file guarded by
//! a process-wide async mutex plus a cross-process `fs2` file lock with
//! retry/backoff, so `load`/`save` are safe even if a second service
//! process briefly races this one against the same state file.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod store;

pub use store::StateStore;
