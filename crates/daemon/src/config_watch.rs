// SPDX-License-Identifier: MIT

//! Hot-reloading configuration source: watches a user's backup config file
//! and republishes a freshly validated job list on every disk change,
//! debounced so a burst of writes from one editor save collapses into a
//! single reload.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use mb_core::{expand_json_text, validate_backup_config, ResolvedJob};
use notify::{RecursiveMode, Watcher};
use tokio::sync::watch;
use tracing::warn;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Spawns a background task that watches `config_path` and keeps `rx`
/// up to date with the latest successfully validated job list. A failed
/// reload is logged and leaves the previous snapshot in place.
pub fn spawn(config_path: PathBuf, home: PathBuf) -> watch::Receiver<Vec<ResolvedJob>> {
    let initial = load_once(&config_path, &home).unwrap_or_default();
    let (tx, rx) = watch::channel(initial);

    tokio::task::spawn_blocking(move || watch_loop(config_path, home, tx));
    rx
}

fn watch_loop(config_path: PathBuf, home: PathBuf, tx: watch::Sender<Vec<ResolvedJob>>) {
    let (notify_tx, notify_rx) = mpsc::channel();
    let mut watcher = match notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    }) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "failed to start config watcher, reload disabled");
            return;
        }
    };

    let Some(parent) = config_path.parent() else { return };
    if watcher.watch(parent, RecursiveMode::NonRecursive).is_err() {
        return;
    }

    loop {
        let Ok(first) = notify_rx.recv() else { return };
        if !touches(&first, &config_path) {
            continue;
        }
        // Coalesce a burst of events from one save into a single reload.
        while notify_rx.recv_timeout(DEBOUNCE).is_ok() {}

        match load_once(&config_path, &home) {
            Ok(jobs) => {
                let _ = tx.send(jobs);
            }
            Err(e) => warn!(path = %config_path.display(), error = %e, "config reload failed, keeping previous configuration"),
        }
    }
}

fn touches(event: &notify::Result<notify::Event>, config_path: &Path) -> bool {
    match event {
        Ok(event) => event.paths.iter().any(|p| p == config_path),
        Err(_) => false,
    }
}

fn load_once(config_path: &Path, home: &Path) -> Result<Vec<ResolvedJob>, String> {
    let raw = std::fs::read_to_string(config_path).map_err(|e| e.to_string())?;
    let expanded = expand_json_text(&raw, home);
    validate_backup_config(&expanded, home)
        .map_err(|errors| errors.iter().map(|e| e.error.clone()).collect::<Vec<_>>().join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn loads_initial_config_and_reloads_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("cfg.json");
        let home = dir.path().to_path_buf();
        std::fs::write(
            &config_path,
            r#"{"Backup":{"Jobs":[{"Name":"docs","Source":"/tmp/a","Destination":"/tmp/b","Include":["*"]}]}}"#,
        )
        .unwrap();

        let mut rx = spawn(config_path.clone(), home);
        // give the background watcher time to register before we mutate the file
        tokio::time::sleep(StdDuration::from_millis(50)).await;

        assert_eq!(rx.borrow().len(), 1);

        std::fs::write(
            &config_path,
            r#"{"Backup":{"Jobs":[{"Name":"docs","Source":"/tmp/a","Destination":"/tmp/b","Include":["*"]},{"Name":"photos","Source":"/tmp/c","Destination":"/tmp/d","Include":["*"]}]}}"#,
        )
        .unwrap();

        tokio::time::timeout(StdDuration::from_secs(2), rx.changed()).await.unwrap().unwrap();
        assert_eq!(rx.borrow().len(), 2);
    }
}
