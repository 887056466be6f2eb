//! Integration tests for the drill binary.
//!
//! These tests verify end-to-end behavior including:
//! - Guide checking
//! - Routine display, as text and JSON
//! - Running a routine with a tiny time unit and no sound

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const GUIDE: &str = "\
kettle_swing:
    Name: Kettlebell swing
    Description: Two handed swing to chest height
    Tips:
        - Drive with the hips
        - Keep the back flat
goblet_squat:
    Name: Goblet squat
    Description: Squat holding the bell at the chest
";

const ROUTINE: &str = "\
# Short test routine
name=
  Morning
  bells

description=Swings and squats
rest=0
read_delay=0
kettle_swing,2
goblet_squat,1,1
";

/// Helper to create a test directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write test file");
    path
}

/// Helper to get the CLI with its config directory pointed at `dir`
fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("drill"));
    cmd.env("XDG_CONFIG_HOME", dir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    let temp_dir = setup_test_dir();
    cli(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Timed exercise routines"));
}

#[test]
fn test_check_guide() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);

    cli(temp_dir.path())
        .arg("check")
        .arg(&guide)
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed 2 exercises OK"))
        .stdout(predicate::str::contains("Kettlebell swing").not());
}

#[test]
fn test_check_guide_verbose_shows_tips() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);

    cli(temp_dir.path())
        .arg("check")
        .arg(&guide)
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("kettle_swing: Kettlebell swing"))
        .stdout(predicate::str::contains("(2 tips)"));

    cli(temp_dir.path())
        .arg("check")
        .arg(&guide)
        .arg("-vv")
        .assert()
        .success()
        .stdout(predicate::str::contains("- Drive with the hips"));
}

#[test]
fn test_check_bad_guide_fails() {
    let temp_dir = setup_test_dir();
    let guide = write(
        temp_dir.path(),
        "bad.yaml",
        "kettle_swing:\n    Description: No name here\n",
    );

    cli(temp_dir.path())
        .arg("check")
        .arg(&guide)
        .assert()
        .failure()
        .stderr(predicate::str::contains("it has no Name"));
}

#[test]
fn test_show_routine() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);
    let routine = write(temp_dir.path(), "routine.txt", ROUTINE);

    cli(temp_dir.path())
        .arg("show")
        .arg(&routine)
        .arg("-g")
        .arg(&guide)
        .assert()
        .success()
        .stdout(predicate::str::contains("Morning bells"))
        .stdout(predicate::str::contains("Swings and squats"))
        .stdout(predicate::str::contains("total time 0'04\""))
        .stdout(predicate::str::contains("Goblet squat (goblet_squat)"));
}

#[test]
fn test_show_routine_json() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);
    let routine = write(temp_dir.path(), "routine.txt", ROUTINE);

    let output = cli(temp_dir.path())
        .arg("show")
        .arg(&routine)
        .arg("--guide")
        .arg(&guide)
        .arg("--json")
        .output()
        .expect("Failed to run drill");
    assert!(output.status.success());

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output is not JSON");
    assert_eq!(summary["name"], "Morning bells");
    assert_eq!(summary["total_time"], 4);
    assert_eq!(summary["exercises"][0]["id"], "kettle_swing");
    assert_eq!(summary["exercises"][1]["rest"], 1);
}

#[test]
fn test_run_routine() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);
    let routine = write(temp_dir.path(), "routine.txt", ROUTINE);

    cli(temp_dir.path())
        .arg("run")
        .arg(&routine)
        .arg("-g")
        .arg(&guide)
        .arg("--no-sound")
        .arg("--interval-ms")
        .arg("10")
        .assert()
        .success()
        .stdout(predicate::str::contains("Kettlebell swing"))
        .stdout(predicate::str::contains("- Keep the back flat"))
        .stdout(predicate::str::contains("Done: Goblet squat"))
        .stdout(predicate::str::contains("Routine complete!"));
}

#[test]
fn test_guides_from_config() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);
    let routine = write(temp_dir.path(), "routine.txt", ROUTINE);
    let config = write(
        temp_dir.path(),
        "config.toml",
        &format!("[guides]\npaths = [{:?}]\n", guide.display().to_string()),
    );

    cli(temp_dir.path())
        .arg("show")
        .arg(&routine)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Kettlebell swing"));
}

#[test]
fn test_duplicate_guides_warn() {
    let temp_dir = setup_test_dir();
    let first = write(temp_dir.path(), "first.yaml", GUIDE);
    let second = write(
        temp_dir.path(),
        "second.yaml",
        "kettle_swing:\n    Name: Heavier swing\n",
    );
    let routine = write(temp_dir.path(), "routine.txt", ROUTINE);

    cli(temp_dir.path())
        .arg("show")
        .arg(&routine)
        .arg("-g")
        .arg(&first)
        .arg("-g")
        .arg(&second)
        .assert()
        .success()
        .stderr(predicate::str::contains("Duplicate exercise(s) 'kettle_swing'"))
        .stdout(predicate::str::contains("Heavier swing"));
}

#[test]
fn test_bad_routine_reports_line() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);
    let routine = write(
        temp_dir.path(),
        "routine.txt",
        "rest=1\nread_delay=1\nkettle_swing,lots\n",
    );

    cli(temp_dir.path())
        .arg("show")
        .arg(&routine)
        .arg("-g")
        .arg(&guide)
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"lots\" is not a valid duration"))
        .stderr(predicate::str::contains("Line: kettle_swing,lots"));
}

#[test]
fn test_unknown_exercise_fails() {
    let temp_dir = setup_test_dir();
    let guide = write(temp_dir.path(), "guide.yaml", GUIDE);
    let routine = write(temp_dir.path(), "routine.txt", "rest=1\nread_delay=1\nburpee,10\n");

    cli(temp_dir.path())
        .arg("run")
        .arg(&routine)
        .arg("-g")
        .arg(&guide)
        .arg("--no-sound")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Exercise burpee not found"));
}
