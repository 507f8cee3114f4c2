// SPDX-License-Identifier: MIT

//! Structured logging setup: the service's own `tracing` stream, and the
//! per-user rolling sinks each worker owns.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USER_LOG_PREFIX: &str = "backup";
const SERVICE_LOG_PREFIX: &str = "service";
const RETAIN_FILE_COUNT: usize = 7;

/// A `Write` implementation that rotates to a new file named
/// `{prefix}-{date}.log` whenever the UTC calendar day advances.
/// `tracing_appender::rolling::RollingFileAppender` always joins its
/// prefix, date, and suffix with literal dots, which cannot produce this
/// hyphen-before-date contract, so the daily swap is done by hand here.
/// `tracing_appender::non_blocking` hands this to a single dedicated
/// worker thread, so no internal synchronization is needed.
struct DailyRotatingWriter {
    dir: PathBuf,
    prefix: &'static str,
    date: NaiveDate,
    file: File,
}

impl DailyRotatingWriter {
    fn open(dir: &Path, prefix: &'static str) -> std::io::Result<Self> {
        let date = chrono::Utc::now().date_naive();
        let file = Self::open_file(dir, prefix, date)?;
        Ok(Self { dir: dir.to_path_buf(), prefix, date, file })
    }

    fn open_file(dir: &Path, prefix: &str, date: NaiveDate) -> std::io::Result<File> {
        std::fs::OpenOptions::new().create(true).append(true).open(dir.join(format!("{prefix}-{date}.log")))
    }
}

impl Write for DailyRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let today = chrono::Utc::now().date_naive();
        if today != self.date {
            self.file = Self::open_file(&self.dir, self.prefix, today)?;
            self.date = today;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// Initializes the service's own diagnostic stream: an env-filtered
/// `tracing-subscriber` layer writing to a daily-rolling file under
/// `{log_dir}/service-*.log`. The returned guard must be held for the
/// lifetime of the process or buffered log lines are dropped on exit.
pub fn init_service_logging(log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let writer = DailyRotatingWriter::open(log_dir, SERVICE_LOG_PREFIX)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let filter = EnvFilter::try_from_env("MAXBACKUP_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

/// A per-user rolling log sink at `{home}/.max/logs/backup-*.log`, daily
/// rollover, retaining the last 7 files. Writes bypass the global
/// `tracing` dispatcher so each worker's log stays isolated from the
/// service's own diagnostic stream and from every other worker.
pub struct UserLogSink {
    log_dir: PathBuf,
    writer: Mutex<NonBlocking>,
    _guard: WorkerGuard,
}

impl UserLogSink {
    pub fn open(home: &Path) -> std::io::Result<Self> {
        let log_dir = home.join(".max").join("logs");
        std::fs::create_dir_all(&log_dir)?;
        let writer = DailyRotatingWriter::open(&log_dir, USER_LOG_PREFIX)?;
        let (writer, guard) = tracing_appender::non_blocking(writer);
        let sink = Self { log_dir, writer: Mutex::new(writer), _guard: guard };
        sink.sweep_retention();
        Ok(sink)
    }

    pub fn info(&self, message: &str) {
        self.write_line("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.write_line("WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.write_line("ERROR", message);
    }

    fn write_line(&self, level: &str, message: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{now} {level} {message}");
        }
    }

    /// `tracing-appender` has no built-in retention count, so each worker
    /// deletes the oldest rolled files beyond the last 7 itself. Cheap
    /// enough to call once per backup loop iteration.
    pub fn sweep_retention(&self) {
        let prefix = format!("{USER_LOG_PREFIX}-");
        let Ok(entries) = std::fs::read_dir(&self.log_dir) else { return };
        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .collect();
        files.sort_by_key(|e| e.file_name());

        if files.len() > RETAIN_FILE_COUNT {
            for stale in &files[..files.len() - RETAIN_FILE_COUNT] {
                let _ = std::fs::remove_file(stale.path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_retention_keeps_only_the_newest_seven() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join(".max").join("logs");
        std::fs::create_dir_all(&log_dir).unwrap();
        for day in 1..=10 {
            std::fs::write(log_dir.join(format!("{USER_LOG_PREFIX}-2026-01-{day:02}.log")), b"x").unwrap();
        }

        let sink = UserLogSink::open(dir.path()).unwrap();
        sink.sweep_retention();

        let remaining: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(&format!("{USER_LOG_PREFIX}-")))
            .collect();
        assert_eq!(remaining.len(), RETAIN_FILE_COUNT);
    }

    #[test]
    fn user_log_sink_writes_hyphenated_dated_filename() {
        let dir = tempfile::tempdir().unwrap();
        let sink = UserLogSink::open(dir.path()).unwrap();
        sink.info("hello");
        drop(sink);

        let log_dir = dir.path().join(".max").join("logs");
        let today = chrono::Utc::now().date_naive();
        let expected = log_dir.join(format!("{USER_LOG_PREFIX}-{today}.log"));
        assert!(expected.exists(), "expected {expected:?} to exist");
    }
}
