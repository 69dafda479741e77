// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{NoopModelConfig, TimeRange};
use chrono::{TimeZone, Utc};
use std::time::Duration as StdDuration;
use tempfile::tempdir;

fn sample_run(output_dir: std::path::PathBuf) -> ModelRun {
    ModelRun::new(
        "run-1".to_string(),
        TimeRange {
            start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
            interval: StdDuration::from_secs(3600),
        },
        output_dir,
        Box::new(NoopModelConfig::default()),
        false,
    )
}

#[tokio::test]
async fn succeeds_when_command_exits_zero() {
    let tmp = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let backend = LocalBackend::new("exit 0");
    let cancel = CancellationToken::new();

    let outcome = backend.launch(&run, tmp.path(), &cancel).await;
    assert_eq!(outcome.state, RunState::Succeeded);
}

#[tokio::test]
async fn fails_with_exit_code_on_nonzero_exit() {
    let tmp = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let backend = LocalBackend::new("exit 7");
    let cancel = CancellationToken::new();

    let outcome = backend.launch(&run, tmp.path(), &cancel).await;
    assert_eq!(outcome.state, RunState::Failed { exit_code: Some(7) });
}

#[tokio::test]
async fn captures_stdout_in_log_tail() {
    let tmp = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let backend = LocalBackend::new("echo hello-from-run");
    let cancel = CancellationToken::new();

    let outcome = backend.launch(&run, tmp.path(), &cancel).await;
    assert!(outcome.log_tail.contains("hello-from-run"));
}

#[tokio::test]
async fn honors_configured_env_vars() {
    let tmp = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let spec = BackendSpec {
        env_vars: [("GREETING".to_string(), "ahoy".to_string())].into_iter().collect(),
        ..BackendSpec::default()
    };
    let backend = LocalBackend::new("echo $GREETING").with_spec(spec);
    let cancel = CancellationToken::new();

    let outcome = backend.launch(&run, tmp.path(), &cancel).await;
    assert!(outcome.log_tail.contains("ahoy"));
}

#[tokio::test]
async fn honors_a_working_dir_override() {
    let tmp = tempdir().unwrap();
    let workdir = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let spec = BackendSpec {
        working_dir: Some(workdir.path().to_path_buf()),
        ..BackendSpec::default()
    };
    let backend = LocalBackend::new("pwd").with_spec(spec);
    let cancel = CancellationToken::new();

    let outcome = backend.launch(&run, tmp.path(), &cancel).await;
    assert!(outcome.log_tail.contains(&workdir.path().to_string_lossy().to_string()));
}

#[tokio::test]
async fn cancellation_stops_a_long_running_command() {
    let tmp = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let backend = LocalBackend::new("sleep 60");
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(StdDuration::from_millis(20)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(StdDuration::from_secs(5), backend.launch(&run, tmp.path(), &cancel))
        .await
        .expect("launch should return once cancelled");
    assert_eq!(outcome.state, RunState::Cancelled);
}

#[tokio::test]
async fn timeout_stops_a_long_running_command() {
    let tmp = tempdir().unwrap();
    let run = sample_run(tmp.path().to_path_buf());
    let backend = LocalBackend::new("sleep 60").with_spec(BackendSpec {
        timeout: Some(StdDuration::from_millis(30)),
        grace_period: StdDuration::from_millis(100),
        ..BackendSpec::default()
    });
    let cancel = CancellationToken::new();

    let outcome = tokio::time::timeout(StdDuration::from_secs(5), backend.launch(&run, tmp.path(), &cancel))
        .await
        .expect("launch should return once timed out");
    assert_eq!(outcome.state, RunState::TimedOut);
}

#[test]
fn factory_requires_command() {
    let err = factory(serde_json::json!({})).unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn factory_parses_timeout_and_grace_period() {
    let backend = factory(serde_json::json!({
        "command": "echo hi",
        "timeout_seconds": "90s",
        "grace_period": "2s",
    }))
    .unwrap();
    assert_eq!(backend.backend_type(), "local");
}

#[test]
fn factory_rejects_non_string_non_number_timeout() {
    let err = factory(serde_json::json!({"command": "echo hi", "timeout_seconds": true})).unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}
