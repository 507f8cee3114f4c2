// SPDX-License-Identifier: MIT

//! Builders used by other crates' test suites. Gated behind the
//! `test-support` feature so none of this ships in release builds.

use std::path::PathBuf;

use chrono::Utc;

use crate::model::{BackupJob, ResolvedJob, UserRegistration};

/// A `UserRegistration` with sensible defaults, overridable field by field.
pub struct UserRegistrationBuilder {
    sid: String,
    username: String,
    config_path: PathBuf,
}

impl UserRegistrationBuilder {
    pub fn new(sid: impl Into<String>) -> Self {
        let sid = sid.into();
        Self {
            username: sid.to_ascii_lowercase(),
            config_path: PathBuf::from(format!("/home/{}/.maxbackup.json", sid.to_ascii_lowercase())),
            sid,
        }
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn config_path(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = config_path.into();
        self
    }

    pub fn build(self) -> UserRegistration {
        UserRegistration {
            sid: self.sid,
            username: self.username,
            config_path: self.config_path,
            registered_at: Utc::now(),
        }
    }
}

/// A raw `BackupJob` with sensible defaults for constructing config fixtures.
pub fn sample_backup_job(name: &str, source: &str, destination: &str) -> BackupJob {
    BackupJob {
        name: name.to_string(),
        source: source.to_string(),
        destination: destination.to_string(),
        include: vec!["*".to_string()],
        exclude: Vec::new(),
    }
}

/// A `ResolvedJob` with sensible defaults, for tests that exercise the
/// backup engine directly without going through config parsing.
pub fn sample_resolved_job(name: &str, source: PathBuf, destination: PathBuf) -> ResolvedJob {
    ResolvedJob {
        name: name.to_string(),
        source,
        destination,
        include: vec!["*".to_string()],
        exclude: Vec::new(),
    }
}
