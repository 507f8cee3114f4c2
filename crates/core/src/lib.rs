// SPDX-License-Identifier: MIT

//! Shared data model, error kinds, and path expansion for the Max Backup
//! service. Consumed by the wire protocol, the service-state store, and the
//! daemon itself, so none of it may depend on tokio or any I/O transport.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod error;
mod model;
mod path_expand;

pub use error::{ServiceError, ValidationError};
pub use model::{
    validate_backup_config, BackupConfig, BackupJob, BackupSection, ResolvedJob, RunSummary,
    ServiceConfig, UserRegistration,
};
pub use path_expand::{expand_json_text, expand_plain};

#[cfg(feature = "test-support")]
pub mod test_support;
