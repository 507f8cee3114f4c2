use std::path::PathBuf;

use super::*;

fn home() -> PathBuf {
    PathBuf::from("/home/alice")
}

fn config_json(jobs: &str) -> String {
    format!(r#"{{"Backup": {{"Jobs": [{jobs}]}}}}"#)
}

#[test]
fn accepts_a_well_formed_job() {
    let json = config_json(
        r#"{"Name": "docs", "Source": "/home/alice/Documents", "Destination": "/mnt/backup/docs", "Include": ["*"]}"#,
    );
    let resolved = validate_backup_config(&json, &home()).expect("should validate");
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].name, "docs");
    assert_eq!(resolved[0].source, PathBuf::from("/home/alice/Documents"));
}

#[test]
fn rejects_malformed_json_with_single_json_field_error() {
    let errors = validate_backup_config("{not json", &home()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "JSON");
}

#[test]
fn rejects_non_object_root() {
    let errors = validate_backup_config("[1,2,3]", &home()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "JSON");
}

#[test]
fn missing_backup_section_yields_zero_jobs() {
    let resolved = validate_backup_config("{}", &home()).expect("empty config is valid");
    assert!(resolved.is_empty());
}

#[test]
fn rejects_duplicate_job_names() {
    let json = config_json(
        r#"{"Name": "docs", "Source": "/a", "Destination": "/b", "Include": ["*"]},
           {"Name": "docs", "Source": "/c", "Destination": "/d", "Include": ["*"]}"#,
    );
    let errors = validate_backup_config(&json, &home()).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "name" && e.error.contains("duplicate")));
}

#[test]
fn rejects_job_with_no_include_patterns() {
    let json = config_json(r#"{"Name": "docs", "Source": "/a", "Destination": "/b", "Include": []}"#);
    let errors = validate_backup_config(&json, &home()).unwrap_err();
    assert_eq!(errors[0].field, "include");
}

#[test]
fn rejects_relative_source() {
    let json = config_json(r#"{"Name": "docs", "Source": "Documents", "Destination": "/b", "Include": ["*"]}"#);
    let errors = validate_backup_config(&json, &home()).unwrap_err();
    assert_eq!(errors[0].field, "source");
}

#[test]
fn rejects_destination_as_proper_ancestor_of_source() {
    let json = config_json(
        r#"{"Name": "docs", "Source": "/home/alice/Documents", "Destination": "/home/alice", "Include": ["*"]}"#,
    );
    let errors = validate_backup_config(&json, &home()).unwrap_err();
    assert_eq!(errors[0].field, "destination");
}

#[test]
fn allows_sibling_destination_with_shared_prefix() {
    let json = config_json(
        r#"{"Name": "docs", "Source": "/home/alice/Documents", "Destination": "/home/alice/Documents2", "Include": ["*"]}"#,
    );
    validate_backup_config(&json, &home()).expect("sibling-like prefix must not be treated as ancestor");
}

#[test]
fn allows_destination_equal_to_source_parent_sibling() {
    let json = config_json(
        r#"{"Name": "docs", "Source": "/data/src", "Destination": "/data/dst", "Include": ["*"]}"#,
    );
    validate_backup_config(&json, &home()).expect("unrelated destination is fine");
}

#[test]
fn is_proper_ancestor_detects_equal_paths_as_not_proper() {
    assert!(!is_proper_ancestor(Path::new("/a/b"), Path::new("/a/b")));
}

#[test]
fn is_proper_ancestor_detects_real_ancestor() {
    assert!(is_proper_ancestor(Path::new("/a"), Path::new("/a/b/c")));
}

#[test]
fn is_proper_ancestor_rejects_string_prefix_false_positive() {
    assert!(!is_proper_ancestor(Path::new("/a/b"), Path::new("/a/bc/d")));
}

#[test]
fn service_config_round_trips_through_json() {
    let mut cfg = ServiceConfig::default();
    cfg.registered_users.push(UserRegistration {
        sid: "S-1".into(),
        username: "alice".into(),
        config_path: PathBuf::from("/home/alice/.maxbackup.json"),
        registered_at: Utc::now(),
    });
    let text = serde_json::to_string(&cfg).unwrap();
    let back: ServiceConfig = serde_json::from_str(&text).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn service_config_find_and_remove() {
    let mut cfg = ServiceConfig::default();
    cfg.registered_users.push(UserRegistration {
        sid: "S-1".into(),
        username: "alice".into(),
        config_path: PathBuf::from("/home/alice/.maxbackup.json"),
        registered_at: Utc::now(),
    });
    assert!(cfg.contains("S-1"));
    assert!(cfg.find("S-2").is_none());
    let removed = cfg.remove("S-1").unwrap();
    assert_eq!(removed.username, "alice");
    assert!(!cfg.contains("S-1"));
}

#[test]
fn run_summary_totals() {
    let summary = RunSummary {
        backup_count: 2,
        up_to_date_count: 3,
        error_count: 1,
        missing_count: 1,
        backup_byte_count: 4096,
        cancelled: false,
    };
    assert_eq!(summary.total_accounted(), 7);
}
