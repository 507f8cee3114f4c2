// SPDX-License-Identifier: MIT

use mb_core::{ServiceError, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Info,
    Success,
    Error,
    Verbose,
}

/// `{ status, message, isFinal, validationErrors? }`. Exactly one response
/// per conversation carries `isFinal = true`, and it is the last one sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "lowercase"))]
pub struct Response {
    pub status: ResponseStatus,
    pub message: String,
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<ValidationError>>,
}

impl Response {
    pub fn info(message: impl Into<String>) -> Self {
        Self { status: ResponseStatus::Info, message: message.into(), is_final: false, validation_errors: None }
    }

    pub fn success_final(message: impl Into<String>) -> Self {
        Self { status: ResponseStatus::Success, message: message.into(), is_final: true, validation_errors: None }
    }

    pub fn error_final(message: impl Into<String>) -> Self {
        Self { status: ResponseStatus::Error, message: message.into(), is_final: true, validation_errors: None }
    }

    pub fn validation_failure(errors: Vec<ValidationError>) -> Self {
        Self {
            status: ResponseStatus::Error,
            message: "configuration validation failed".to_string(),
            is_final: true,
            validation_errors: Some(errors),
        }
    }
}

/// Translates an uncaught service error into the final `Error` response a
/// client always sees, per the propagation policy: an IPC handler never
/// lets an error escape as anything other than a terminal response.
impl From<ServiceError> for Response {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::ValidationFailure(errors) => Response::validation_failure(errors),
            other => Response::error_final(other.to_string()),
        }
    }
}
