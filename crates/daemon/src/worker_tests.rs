use mb_core::UserRegistration;
use tempfile::tempdir;

use super::*;

fn registration(home: &std::path::Path) -> UserRegistration {
    UserRegistration {
        sid: "S-WORKER-1".to_string(),
        username: "alice".to_string(),
        config_path: home.join("cfg.json"),
        registered_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn starts_runs_and_shuts_down_cleanly() {
    let home = tempdir().unwrap();
    std::fs::write(
        home.path().join("cfg.json"),
        r#"{"Backup":{"Jobs":[]}}"#,
    )
    .unwrap();

    let worker = RuntimeWorker::spawn(registration(home.path()), home.path().to_path_buf()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(worker.state(), WorkerState::Running);

    let finished = worker.shutdown(Duration::from_secs(5)).await;
    assert!(finished, "worker should shut down within the grace period");
}

#[tokio::test]
async fn runs_a_configured_job_and_writes_to_its_own_log() {
    let home = tempdir().unwrap();
    let source = home.path().join("src");
    let destination = home.path().join("dst");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("a.txt"), b"hi").unwrap();

    let config = format!(
        r#"{{"Backup":{{"Jobs":[{{"Name":"docs","Source":"{}","Destination":"{}","Include":["*"]}}]}}}}"#,
        source.display(),
        destination.display(),
    );
    std::fs::write(home.path().join("cfg.json"), config).unwrap();

    let worker = RuntimeWorker::spawn(registration(home.path()), home.path().to_path_buf()).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    worker.shutdown(Duration::from_secs(5)).await;

    assert!(destination.join("a.txt").exists());
    let log_dir = home.path().join(".max").join("logs");
    assert!(log_dir.is_dir());
}
