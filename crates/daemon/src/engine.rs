// SPDX-License-Identifier: MIT

//! The backup engine: given a resolved job, enumerate matching files under
//! `source` via include/exclude globs and mirror changed ones into
//! `destination`, preserving timestamps and accounting for progress.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use mb_core::{ResolvedJob, RunSummary};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

const THROTTLE_INTERVAL: Duration = Duration::from_millis(500);
const THROTTLE_SLEEP: Duration = Duration::from_millis(10);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// Runs one backup job to completion (or to cancellation). Never panics on
/// a single-file failure; failures are classified into `errorCount` or
/// `missingCount` and logged, and the walk continues.
#[instrument(skip(job, cancel), fields(job = %job.name))]
pub async fn run_job(job: &ResolvedJob, cancel: &CancellationToken) -> RunSummary {
    let mut summary = RunSummary::default();

    if !job.source.is_dir() {
        warn!(source = %job.source.display(), "source directory does not exist, skipping job");
        return summary;
    }

    if !job.destination.exists() {
        if let Err(e) = tokio::fs::create_dir_all(&job.destination).await {
            tracing::error!(destination = %job.destination.display(), error = %e, "failed to create destination directory");
            return summary;
        }
    }

    let glob_set = match build_glob_set(job) {
        Ok(set) => set,
        Err(e) => {
            tracing::error!(error = %e, "failed to compile glob patterns");
            return summary;
        }
    };

    let mut candidates = Vec::new();
    if !enumerate(&job.source, &job.source, &glob_set, cancel, &mut candidates) {
        summary.cancelled = true;
        return summary;
    }
    candidates.sort();

    let total = candidates.len();
    let placeholder_re = cloud_placeholder_pattern();
    let mut throttle_clock = Instant::now();
    let mut progress_clock = Instant::now();

    for (index, relative) in candidates.iter().enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        if is_cloud_placeholder(relative, &placeholder_re) && has_system_attribute(&job.source.join(relative)) {
            continue;
        }

        copy_one(job, relative, &mut summary);

        if throttle_clock.elapsed() >= THROTTLE_INTERVAL {
            tokio::time::sleep(THROTTLE_SLEEP).await;
            throttle_clock = Instant::now();
        }
        if progress_clock.elapsed() >= PROGRESS_INTERVAL {
            let percent = (index + 1) * 100 / total.max(1);
            info!(percent, processed = index + 1, total, "backup progress");
            progress_clock = Instant::now();
        }
    }

    log_summary(job, &summary, total);
    summary
}

fn build_glob_set(job: &ResolvedJob) -> Result<(GlobSet, GlobSet), globset::Error> {
    let mut includes = GlobSetBuilder::new();
    for pattern in &job.include {
        includes.add(Glob::new(pattern)?);
    }

    let mut excludes = GlobSetBuilder::new();
    for pattern in &job.exclude {
        excludes.add(Glob::new(pattern)?);
    }
    if is_volume_root(&job.source) {
        #[allow(clippy::expect_used)]
        {
            excludes.add(Glob::new("$RECYCLE.BIN/**").expect("constant glob pattern is valid"));
            excludes.add(Glob::new("System Volume Information/**").expect("constant glob pattern is valid"));
            excludes.add(Glob::new("*~").expect("constant glob pattern is valid"));
        }
    }

    Ok((includes.build()?, excludes.build()?))
}

fn is_volume_root(path: &Path) -> bool {
    path.parent().is_none() || path.parent() == Some(Path::new(""))
}

/// Recursively walks `dir`, collecting paths (relative to `root`) that
/// match `include` and not `exclude`. Returns `false` if cancellation was
/// observed mid-walk, in which case the walk aborts immediately.
fn enumerate(
    root: &Path,
    dir: &Path,
    glob_set: &(GlobSet, GlobSet),
    cancel: &CancellationToken,
    out: &mut Vec<PathBuf>,
) -> bool {
    let (includes, excludes) = glob_set;
    let mut entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).collect::<Vec<_>>(),
        Err(_) => return true,
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if cancel.is_cancelled() {
            return false;
        }
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if !enumerate(root, &path, glob_set, cancel, out) {
                return false;
            }
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => continue,
        };
        if includes.is_match(&relative) && !excludes.is_match(&relative) {
            out.push(relative);
        }
    }
    true
}

#[allow(clippy::expect_used)]
fn cloud_placeholder_pattern() -> Regex {
    Regex::new(r"^\.[0-9A-Fa-f-]{32,36}$").expect("constant placeholder pattern is valid")
}

fn is_cloud_placeholder(relative: &Path, pattern: &Regex) -> bool {
    let Some(name) = relative.file_name().and_then(|n| n.to_str()) else { return false };
    (name.len() == 33 || name.len() == 37) && pattern.is_match(name)
}

/// Whether the file carries the OS "system" attribute. POSIX has no such
/// attribute; this always reports it as unavailable, which per the
/// contract means the file is never skipped on this basis.
fn has_system_attribute(_path: &Path) -> bool {
    false
}

fn copy_one(job: &ResolvedJob, relative: &Path, summary: &mut RunSummary) {
    let source_path = job.source.join(relative);
    let destination_path = job.destination.join(relative);

    if let Some(parent) = destination_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(path = %destination_path.display(), error = %e, "failed to create destination parent directory");
            summary.error_count += 1;
            return;
        }
    }

    if destination_path.exists() {
        clear_readonly(&destination_path);
        match (std::fs::metadata(&source_path).and_then(|m| m.modified()), std::fs::metadata(&destination_path).and_then(|m| m.modified())) {
            (Ok(src_mtime), Ok(dst_mtime)) if src_mtime == dst_mtime => {
                summary.up_to_date_count += 1;
                return;
            }
            _ => {}
        }
    }

    match std::fs::copy(&source_path, &destination_path) {
        Ok(bytes) => {
            summary.backup_count += 1;
            summary.backup_byte_count += bytes;
            propagate_timestamps(&source_path, &destination_path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            summary.missing_count += 1;
        }
        Err(e) if is_sharing_violation(&e) || e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!(path = %source_path.display(), error = %e, "file in use or inaccessible during copy");
            summary.error_count += 1;
        }
        Err(e) => {
            tracing::error!(path = %source_path.display(), error = %e, "failed to copy file");
            summary.error_count += 1;
        }
    }
}

fn is_sharing_violation(e: &std::io::Error) -> bool {
    matches!(e.raw_os_error(), Some(11) | Some(26))
}

fn clear_readonly(path: &Path) {
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut perms = metadata.permissions();
        if perms.readonly() {
            perms.set_readonly(false);
            let _ = std::fs::set_permissions(path, perms);
        }
    }
}

fn propagate_timestamps(source: &Path, destination: &Path) {
    let times = (|| -> std::io::Result<std::fs::FileTimes> {
        let metadata = std::fs::metadata(source)?;
        let mut times = std::fs::FileTimes::new().set_modified(metadata.modified()?);
        if let Ok(created) = metadata.created() {
            times = times.set_accessed(created);
        }
        Ok(times)
    })();

    match times {
        Ok(times) => {
            if let Ok(file) = std::fs::OpenOptions::new().write(true).open(destination) {
                if let Err(e) = file.set_times(times) {
                    warn!(path = %destination.display(), error = %e, "failed to propagate timestamps");
                }
            }
        }
        Err(e) => warn!(path = %source.display(), error = %e, "failed to read source timestamps"),
    }
}

fn log_summary(job: &ResolvedJob, summary: &RunSummary, total: usize) {
    if summary.up_to_date_count == total as u64 && summary.backup_count == 0 {
        info!(job = %job.name, files = total, "all files already up to date");
    } else {
        info!(
            job = %job.name,
            backed_up = summary.backup_count,
            up_to_date = summary.up_to_date_count,
            bytes = %human_bytes(summary.backup_byte_count),
            "backup completed"
        );
    }
    if summary.error_count > 0 {
        warn!(job = %job.name, errors = summary.error_count, "job completed with errors");
    }
    if summary.missing_count > 0 {
        warn!(job = %job.name, missing = summary.missing_count, "some source files disappeared mid-run");
    }
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
