// SPDX-License-Identifier: MIT

//! Error kinds shared across the service. Every variant here corresponds to
//! one of the error kinds named in the design's error-handling section, not
//! to a single implementation detail, so that callers at a crate boundary
//! can match on it without reaching into library-specific error types.

use serde::{Deserialize, Serialize};

/// A single field-level validation failure, carried in a `PipeResponse`'s
/// `validationErrors` when registering a malformed backup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
    pub field: String,
    pub error: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self { job: None, field: field.into(), error: error.into() }
    }

    pub fn for_job(job: impl Into<String>, field: impl Into<String>, error: impl Into<String>) -> Self {
        Self { job: Some(job.into()), field: field.into(), error: error.into() }
    }
}

/// Errors raised by the core of the service (supervisor, state store, IPC
/// handlers, backup engine). Maps directly onto the error kinds named in
/// the design's propagation policy.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("operation timed out")]
    Timeout,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("cannot resolve user profile")]
    IdentityUnresolved,

    #[error("user is already registered")]
    AlreadyRegistered,

    #[error("user is not registered")]
    NotRegistered,

    #[error("configuration validation failed")]
    ValidationFailure(Vec<ValidationError>),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err.to_string())
    }
}

impl ServiceError {
    /// True for errors that represent a legitimate, user-facing outcome
    /// rather than an unexpected failure (used by callers deciding whether
    /// to log at `warn`/`error` level).
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ServiceError::AlreadyRegistered
                | ServiceError::NotRegistered
                | ServiceError::IdentityUnresolved
                | ServiceError::ValidationFailure(_)
                | ServiceError::Cancelled
        )
    }
}
