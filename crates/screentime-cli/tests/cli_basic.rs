//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary with `HOME` pointed at a temporary directory
//! so every test gets its own database and config.

use std::path::Path;
use std::process::{Command, Stdio};

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_screentime-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("SCREENTIME_ENV")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

#[test]
fn test_timer_status_starts_empty() {
    let home = tempfile::tempdir().unwrap();
    let status = run_json(home.path(), &["timer", "status"]);
    assert_eq!(status["remainingCredit"], 0);
    assert_eq!(status["debt"], 0);
    assert_eq!(status["isTracking"], false);
    assert_eq!(status["isDraining"], false);
}

#[test]
fn test_timer_add_and_clamp() {
    let home = tempfile::tempdir().unwrap();
    let status = run_json(home.path(), &["timer", "add", "20"]);
    assert_eq!(status["remainingCredit"], 20);
    let status = run_json(home.path(), &["timer", "add", "-100"]);
    assert_eq!(status["remainingCredit"], 0);
    assert_eq!(status["debt"], 0);
}

#[test]
fn test_timer_drain_condition_flags() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "add", "600"]);
    run_json(home.path(), &["timer", "screen", "on"]);
    let status = run_json(home.path(), &["timer", "start"]);
    assert_eq!(status["isTracking"], true);
    assert_eq!(status["isDraining"], true);

    let status = run_json(home.path(), &["timer", "app", "foreground"]);
    assert_eq!(status["isDraining"], false);
    assert_eq!(status["appForeground"], true);

    let status = run_json(home.path(), &["timer", "stop"]);
    assert_eq!(status["isTracking"], false);
}

#[test]
fn test_timer_reset() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "add", "90"]);
    let status = run_json(home.path(), &["timer", "reset"]);
    assert_eq!(status["remainingCredit"], 0);
    assert_eq!(status["debt"], 0);
    assert_eq!(status["isTracking"], false);
}

#[test]
fn test_reward_calc_and_grant() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(
        home.path(),
        &["reward", "calc", "--difficulty", "hard", "--response-ms", "0"],
    );
    assert_eq!(out["seconds"], 180);
    assert_eq!(out["points"], 150);
    assert_eq!(out["milestone"], false);

    let out = run_json(
        home.path(),
        &["reward", "calc", "--difficulty", "medium", "--streak", "5"],
    );
    assert_eq!(out["seconds"], 240);
    assert_eq!(out["milestone"], true);

    let status = run_json(home.path(), &["reward", "grant", "--difficulty", "easy"]);
    assert_eq!(status["remainingCredit"], 60);

    let stats = run_json(home.path(), &["stats", "summary"]);
    assert_eq!(stats["total_earned_secs"], 60);
    assert_eq!(stats["total_spent_secs"], 0);
}

#[test]
fn test_reward_rejects_unknown_difficulty() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["reward", "calc", "--difficulty", "extreme"]);
    assert_ne!(code, 0);
}

#[test]
fn test_penalty_with_explicit_debt() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(home.path(), &["penalty", "--debt", "120"]);
    assert_eq!(out["points"], 100);
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "timer.tick_interval_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1000");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "rewards.easy_secs", "75"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "rewards.easy_secs"]);
    assert_eq!(stdout.trim(), "75");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "timer.nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_watch_stops_after_updates() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "add", "30"]);
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["watch", "--updates", "2", "--interval-ms", "1000"],
    );
    assert_eq!(code, 0, "watch failed: {stderr}");
    assert!(stdout.contains("Screen Time: 0:30"));
}

#[test]
fn test_sub_second_tick_interval_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["watch", "--updates", "1", "--interval-ms", "100"]);
    assert_ne!(code, 0);

    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "timer.tick_interval_ms", "500"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("timer.tick_interval_ms"));
}

#[test]
fn test_credit_added_by_another_process_survives() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "add", "100"]);
    run_json(home.path(), &["timer", "screen", "on"]);
    run_json(home.path(), &["timer", "start"]);

    let watcher = Command::new(env!("CARGO_BIN_EXE_screentime-cli"))
        .args(["watch", "--updates", "3"])
        .env("HOME", home.path())
        .env_remove("SCREENTIME_ENV")
        .stdout(Stdio::null())
        .spawn()
        .expect("Failed to spawn watcher");

    let added = run_json(home.path(), &["timer", "add", "300"]);
    let added_at = added["remainingCredit"].as_i64().unwrap();
    let output = watcher.wait_with_output().expect("watcher did not finish");
    assert!(output.status.success());

    // Only whole seconds of drain may be missing, never the 300 just added.
    let status = run_json(home.path(), &["timer", "status"]);
    let remaining = status["remainingCredit"].as_i64().unwrap();
    assert!(added_at >= 300, "add lost to concurrent tick: {added}");
    assert!(remaining > 300, "credit lost after watcher ticks: {status}");
}
