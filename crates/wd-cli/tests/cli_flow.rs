//! End-to-end tests driving the `wd` binary.
//!
//! Every invocation is a fresh process, so these also exercise recovery of
//! the active session from the database between commands.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn wd_binary() -> String {
    env!("CARGO_BIN_EXE_wd").to_string()
}

/// Runs `wd` with its config and data isolated under `home`.
fn wd(home: &Path, args: &[&str]) -> Output {
    Command::new(wd_binary())
        .env("HOME", home)
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env("WD_DATABASE_PATH", home.join("workday.db"))
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run wd")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// Runs `wd` and asserts it succeeded, returning stdout.
fn wd_ok(home: &Path, args: &[&str]) -> String {
    let output = wd(home, args);
    assert!(
        output.status.success(),
        "wd {} should succeed: {}",
        args.join(" "),
        stderr(&output)
    );
    stdout(&output)
}

fn status_json(home: &Path) -> serde_json::Value {
    let out = wd_ok(home, &["status", "--json"]);
    serde_json::from_str(&out).expect("status --json should print JSON")
}

#[test]
fn test_full_day_across_processes() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    let out = wd_ok(home, &["start", "--work", "60", "--break", "15"]);
    assert!(
        out.contains("Started working. Target 01:00:00, break allowance 00:15:00."),
        "{out}"
    );

    let again = wd(home, &["start"]);
    assert!(!again.status.success(), "second start should fail");
    assert!(stderr(&again).contains("already running"), "{}", stderr(&again));

    let status = status_json(home);
    assert_eq!(status["state"], "Working");
    assert_eq!(status["target_work_seconds"], 3600);
    assert_eq!(status["target_break_seconds"], 900);

    let out = wd_ok(home, &["break"]);
    assert!(out.contains("working -> on break"), "{out}");
    assert_eq!(status_json(home)["state"], "Break");

    let resume = wd(home, &["resume"]);
    assert!(!resume.status.success(), "resume is only valid after the break ran out");
    assert!(stderr(&resume).contains("cannot resume work"), "{}", stderr(&resume));

    let out = wd_ok(home, &["end-break"]);
    assert!(out.contains("on break -> working"), "{out}");

    let out = wd_ok(home, &["end-day"]);
    assert!(out.contains("working -> idle"), "{out}");
    assert!(out.contains("Day ended."), "{out}");

    let out = wd_ok(home, &["status"]);
    assert!(out.contains("No active session."), "{out}");

    let history: serde_json::Value =
        serde_json::from_str(&wd_ok(home, &["history", "--json"])).unwrap();
    assert_eq!(history["period"], "week");
    assert_eq!(history["rows"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_start_overrides_become_settings() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    wd_ok(home, &["start", "--work", "90", "--notify", "0"]);
    let out = wd_ok(home, &["settings"]);
    assert!(out.contains("Work target:        90 min"), "{out}");
    assert!(out.contains("Break allowance:    60 min"), "{out}");
    assert!(out.contains("Overtime reminders: off"), "{out}");

    let out = wd_ok(home, &["settings", "--break", "20"]);
    assert!(out.starts_with("Settings saved."), "{out}");
    assert!(out.contains("Break allowance:    20 min"), "{out}");

    // The running session keeps the targets it started with.
    assert_eq!(status_json(home)["target_break_seconds"], 3600);
}

#[test]
fn test_discard_abandons_the_session() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    let out = wd_ok(home, &["discard"]);
    assert!(out.contains("No active session."), "{out}");

    wd_ok(home, &["start"]);
    let out = wd_ok(home, &["discard"]);
    assert!(out.starts_with("Discarded session 1 from "), "{out}");
    assert_eq!(status_json(home)["state"], "Idle");
}

#[test]
fn test_commands_without_session_fail() {
    let temp = TempDir::new().unwrap();
    let home = temp.path();

    for args in [&["break"][..], &["end-break"], &["resume"], &["overtime", "start"]] {
        let output = wd(home, args);
        assert!(
            !output.status.success(),
            "wd {} should fail without a session",
            args.join(" ")
        );
        assert!(stderr(&output).contains("while idle"), "{}", stderr(&output));
    }
}

#[test]
fn test_no_subcommand_prints_help() {
    let temp = TempDir::new().unwrap();
    let out = wd_ok(temp.path(), &[]);
    assert!(out.contains("Usage:"), "{out}");
}
