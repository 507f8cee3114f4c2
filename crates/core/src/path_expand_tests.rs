use std::path::PathBuf;

use super::*;

fn home() -> PathBuf {
    PathBuf::from("/home/alice")
}

#[test]
fn expand_plain_bare_tilde() {
    assert_eq!(expand_plain("~", &home()), "/home/alice");
}

#[test]
fn expand_plain_tilde_slash() {
    assert_eq!(expand_plain("~/Documents", &home()), "/home/alice/Documents");
}

#[test]
fn expand_plain_leaves_embedded_tilde_alone() {
    assert_eq!(expand_plain("/var/backups~old", &home()), "/var/backups~old");
}

#[test]
fn expand_plain_userprofile_any_case() {
    assert_eq!(
        expand_plain("%userprofile%/Documents", &home()),
        "/home/alice/Documents"
    );
}

#[test]
fn expand_plain_env_var() {
    std::env::set_var("MB_TEST_VAR", "xyz");
    assert_eq!(expand_plain("/data/$MB_TEST_VAR/x", &home()), "/data/xyz/x");
    assert_eq!(expand_plain("/data/${MB_TEST_VAR}/x", &home()), "/data/xyz/x");
    std::env::remove_var("MB_TEST_VAR");
}

#[test]
fn expand_plain_unset_env_var_left_untouched() {
    std::env::remove_var("MB_TEST_VAR_UNSET");
    assert_eq!(expand_plain("/data/$MB_TEST_VAR_UNSET", &home()), "/data/$MB_TEST_VAR_UNSET");
}

#[test]
fn expand_json_text_tilde_inside_string() {
    let input = r#"{"Source": "~/Documents"}"#;
    let expanded = expand_json_text(input, &home());
    assert_eq!(expanded, r#"{"Source": "/home/alice/Documents"}"#);
    let _: serde_json::Value = serde_json::from_str(&expanded).unwrap();
}

#[test]
fn expand_json_text_windows_home_backslashes_doubled() {
    let home = PathBuf::from(r"C:\Users\alice");
    let input = r#"{"Source": "~\Documents"}"#;
    let expanded = expand_json_text(input, &home);
    let parsed: serde_json::Value = serde_json::from_str(&expanded).unwrap();
    assert_eq!(parsed["Source"], r"C:\Users\alice\Documents");
}

#[test]
fn expand_json_text_leaves_embedded_tilde_alone() {
    let input = r#"{"Destination": "/var/backups~old"}"#;
    let expanded = expand_json_text(input, &home());
    assert_eq!(expanded, input);
}

#[test]
fn expand_json_text_ignores_tilde_outside_strings() {
    let input = "{\n  // ~ not inside a string\n}";
    let expanded = expand_json_text(input, &home());
    assert_eq!(expanded, input);
}

#[test]
fn expand_json_text_userprofile_token() {
    let input = r#"{"Source": "%USERPROFILE%\\Documents"}"#;
    let home = PathBuf::from(r"C:\Users\alice");
    let expanded = expand_json_text(input, &home);
    let parsed: serde_json::Value = serde_json::from_str(&expanded).unwrap();
    assert_eq!(parsed["Source"], r"C:\Users\alice\Documents");
}
