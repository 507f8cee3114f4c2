// SPDX-License-Identifier: MIT

//! The durable data model: user registrations, the daemon's own tunables,
//! and the per-user backup job configuration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::path_expand::expand_plain;

/// One registered user, as persisted in the service state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    pub sid: String,
    pub username: String,
    pub config_path: PathBuf,
    pub registered_at: DateTime<Utc>,
}

/// The daemon's durable tunables plus the set of registered users. Order of
/// `registered_users` is preserved across save/load for deterministic
/// diffs, but carries no semantic meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub pipe_timeout_seconds: u64,
    pub worker_shutdown_timeout_seconds: u64,
    pub registered_users: Vec<UserRegistration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            pipe_timeout_seconds: 30,
            worker_shutdown_timeout_seconds: 60,
            registered_users: Vec::new(),
        }
    }
}

impl ServiceConfig {
    pub fn find(&self, sid: &str) -> Option<&UserRegistration> {
        self.registered_users.iter().find(|u| u.sid == sid)
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.find(sid).is_some()
    }

    pub fn remove(&mut self, sid: &str) -> Option<UserRegistration> {
        let idx = self.registered_users.iter().position(|u| u.sid == sid)?;
        Some(self.registered_users.remove(idx))
    }
}

/// One job inside a user's backup configuration file, as written by the
/// user (paths not yet expanded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupJob {
    pub name: String,
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupSection {
    #[serde(default)]
    pub jobs: Vec<BackupJob>,
}

/// `{ "Backup": { "Jobs": [...] } }` — the on-disk shape of a user's backup
/// configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupConfig {
    #[serde(default)]
    pub backup: BackupSection,
}

/// A `BackupJob` after `~`/`%USERPROFILE%` expansion against a resolved
/// home directory, validated as runnable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    pub name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Bookkeeping accumulated while running a single job, reported in the
/// engine's final summary and used by worker/supervisor tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub backup_count: u64,
    pub up_to_date_count: u64,
    pub error_count: u64,
    pub missing_count: u64,
    pub backup_byte_count: u64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn total_accounted(&self) -> u64 {
        self.backup_count + self.up_to_date_count + self.error_count + self.missing_count
    }
}

/// Parse and validate a user's raw `BackupConfig` JSON text (already run
/// through `expand_json_text`) against a resolved home directory.
///
/// Returns every job fully expanded and ready to run, or the complete list
/// of validation errors found (never a mix: a malformed root fails fast
/// with a single `"JSON"` field error, per the design's scenario 6).
pub fn validate_backup_config(
    expanded_json: &str,
    home: &Path,
) -> Result<Vec<ResolvedJob>, Vec<ValidationError>> {
    let root: serde_json::Value = serde_json::from_str(expanded_json).map_err(|e| {
        vec![ValidationError::new("JSON", format!("Invalid JSON: {e}"))]
    })?;
    if !root.is_object() {
        return Err(vec![ValidationError::new("JSON", "Invalid JSON: root must be an object")]);
    }

    let config: BackupConfig = serde_json::from_value(root)
        .map_err(|e| vec![ValidationError::new("JSON", format!("Invalid JSON: {e}"))])?;

    let mut errors = Vec::new();
    let mut seen_names = std::collections::HashSet::new();
    let mut resolved = Vec::new();

    for job in &config.backup.jobs {
        if job.name.is_empty() {
            errors.push(ValidationError::new("name", "job name must not be empty"));
            continue;
        }
        if !seen_names.insert(job.name.clone()) {
            errors.push(ValidationError::for_job(
                &job.name,
                "name",
                format!("duplicate job name: {}", job.name),
            ));
            continue;
        }
        if job.include.is_empty() {
            errors.push(ValidationError::for_job(
                &job.name,
                "include",
                "at least one include pattern is required",
            ));
            continue;
        }

        let source = PathBuf::from(expand_plain(&job.source, home));
        let destination = PathBuf::from(expand_plain(&job.destination, home));

        if !source.is_absolute() {
            errors.push(ValidationError::for_job(
                &job.name,
                "source",
                format!("source does not expand to an absolute path: {}", job.source),
            ));
            continue;
        }
        if !destination.is_absolute() {
            errors.push(ValidationError::for_job(
                &job.name,
                "destination",
                format!("destination does not expand to an absolute path: {}", job.destination),
            ));
            continue;
        }
        if is_proper_ancestor(&destination, &source) {
            errors.push(ValidationError::for_job(
                &job.name,
                "destination",
                "destination must not be a proper ancestor of source",
            ));
            continue;
        }

        resolved.push(ResolvedJob {
            name: job.name.clone(),
            source,
            destination,
            include: job.include.clone(),
            exclude: job.exclude.clone(),
        });
    }

    if errors.is_empty() {
        Ok(resolved)
    } else {
        Err(errors)
    }
}

/// True when `ancestor` is a proper (strict) ancestor of `descendant`:
/// every component of `ancestor` matches a leading component of
/// `descendant`, and the two paths are not equal.
fn is_proper_ancestor(ancestor: &Path, descendant: &Path) -> bool {
    if ancestor == descendant {
        return false;
    }
    let mut anc = ancestor.components();
    let mut desc = descendant.components();
    loop {
        match anc.next() {
            None => return true,
            Some(a) => match desc.next() {
                Some(d) if d == a => continue,
                _ => return false,
            },
        }
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
