//! CLI integration tests
//!
//! Run the real `skelanim` binary against the bundled demo rig and against
//! broken documents written to temporary directories.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn demo_rig() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/walker.json")
}

fn skelanim() -> Command {
    Command::cargo_bin("skelanim").expect("skelanim binary is built")
}

#[test]
fn test_rig_info_lists_everything() {
    skelanim()
        .args(["rig", "info"])
        .arg(demo_rig())
        .assert()
        .success()
        .stdout(predicate::str::contains("Rig: Walker"))
        .stdout(predicate::str::contains("UpperArm.L"))
        .stdout(predicate::str::contains("Speed > 0.1"))
        .stdout(predicate::str::contains("Any"));
}

#[test]
fn test_rig_info_detailed_shows_events() {
    skelanim()
        .args(["rig", "info", "--detailed"])
        .arg(demo_rig())
        .assert()
        .success()
        .stdout(predicate::str::contains("FootstepL"));
}

#[test]
fn test_rig_validate_accepts_demo() {
    skelanim()
        .args(["rig", "validate"])
        .arg(demo_rig())
        .assert()
        .success()
        .stdout(predicate::str::contains("Rig is valid: 6 bones, 3 clips"));
}

#[test]
fn test_rig_validate_rejects_bad_reference() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("broken.json");
    fs::write(
        &path,
        r#"{
            "skeleton": [ { "name": "Hips" } ],
            "clips": [],
            "controller": { "states": [ { "name": "Idle", "motion": { "Clip": 3 } } ] }
        }"#,
    )
    .expect("write document");

    skelanim()
        .args(["rig", "validate"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed validation"));
}

#[test]
fn test_rig_validate_rejects_forward_parent() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("forward.json");
    fs::write(
        &path,
        r#"{ "skeleton": [ { "name": "Spine", "parent": "Hips" }, { "name": "Hips" } ] }"#,
    )
    .expect("write document");

    skelanim()
        .args(["rig", "validate"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not defined before it"));
}

#[test]
fn test_missing_file_fails() {
    skelanim()
        .args(["rig", "info", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_simulate_reaches_walk() {
    skelanim()
        .args(["simulate", "--frames", "12", "--dt", "0.05", "--set", "Speed=1", "--format", "json"])
        .arg(demo_rig())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""transition_to": "Walk""#))
        .stdout(predicate::str::contains(r#""state": "Walk""#))
        .stdout(predicate::str::contains("FootstepL"));
}

#[test]
fn test_simulate_trigger_fires_jump() {
    skelanim()
        .args(["simulate", "--frames", "6", "--dt", "0.05", "--trigger", "Jump@2", "--format", "json"])
        .arg(demo_rig())
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""state": "Jump""#));
}

#[test]
fn test_simulate_table_output() {
    skelanim()
        .args(["simulate", "--frames", "3"])
        .arg(demo_rig())
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulated 'Walker' for 3 frames"))
        .stdout(predicate::str::contains("Idle"));
}

#[test]
fn test_simulate_rejects_unknown_parameter() {
    skelanim()
        .args(["simulate", "--set", "Altitude=3"])
        .arg(demo_rig())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown parameter 'Altitude'"));
}

#[test]
fn test_simulate_rejects_non_trigger() {
    skelanim()
        .args(["simulate", "--trigger", "Speed@1"])
        .arg(demo_rig())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a trigger parameter"));
}

#[test]
fn test_completions() {
    skelanim()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("skelanim"));
}
