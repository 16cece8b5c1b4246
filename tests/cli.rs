//! Smoke tests for the policy tooling binary.

use std::fs;

use assert_cmd::Command;

const VALID_POLICY: &str = r#"
and:
  - "jwt"
  - httpMethod: "GET"
"#;

#[test]
fn test_check_accepts_a_valid_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    fs::write(&path, VALID_POLICY).unwrap();

    Command::cargo_bin("authgate")
        .unwrap()
        .args(["check", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicates::str::contains("ok"));
}

#[test]
fn test_check_rejects_an_unknown_discriminator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    fs::write(&path, r#"{"unknownKey": 1}"#).unwrap();

    Command::cargo_bin("authgate")
        .unwrap()
        .args(["check", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicates::str::contains("unknownKey"));
}

#[test]
fn test_fmt_emits_canonical_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.yaml");
    fs::write(&path, VALID_POLICY).unwrap();

    Command::cargo_bin("authgate")
        .unwrap()
        .args(["fmt", path.to_str().unwrap(), "--to", "json"])
        .assert()
        .success()
        .stdout(r#"{"and":["jwt",{"httpMethod":"GET"}]}"#);
}
