// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{NoopModelConfig, TimeRange};
use chrono::{TimeZone, Utc};
use std::time::Duration as StdDuration;
use tempfile::tempdir;

fn valid_spec() -> Value {
    serde_json::json!({
        "queue": "gpu",
        "time_limit": "01:30:00",
        "command": "./run-model",
    })
}

fn sample_run() -> ModelRun {
    ModelRun::new(
        "run-1".to_string(),
        TimeRange {
            start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
            interval: StdDuration::from_secs(3600),
        },
        std::path::PathBuf::from("/tmp/out"),
        Box::new(NoopModelConfig::default()),
        false,
    )
}

#[test]
fn factory_builds_from_a_valid_spec() {
    let backend = factory(valid_spec()).unwrap();
    assert_eq!(backend.backend_type(), "slurm");
}

#[test]
fn factory_requires_queue() {
    let mut spec = valid_spec();
    spec.as_object_mut().unwrap().remove("queue");
    let err = factory(spec).unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn factory_requires_command() {
    let mut spec = valid_spec();
    spec.as_object_mut().unwrap().remove("command");
    let err = factory(spec).unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn factory_validates_time_limit_pattern() {
    for bad in ["1:2:3", "abc", "01:30", ""] {
        let mut spec = valid_spec();
        spec["time_limit"] = Value::String(bad.to_string());
        let err = factory(spec).unwrap_err();
        assert!(matches!(err, RunError::InvalidSpec(_)));
    }
}

#[test]
fn factory_accepts_three_digit_hour_time_limits() {
    let mut spec = valid_spec();
    spec["time_limit"] = Value::String("120:00:00".to_string());
    factory(spec).unwrap();
}

#[test]
fn nodes_accepts_the_boundary_values() {
    for nodes in [1, 100] {
        let mut spec = valid_spec();
        spec["nodes"] = Value::from(nodes);
        factory(spec).unwrap();
    }
}

#[test]
fn nodes_rejects_values_outside_the_boundary() {
    for nodes in [0, 101] {
        let mut spec = valid_spec();
        spec["nodes"] = Value::from(nodes);
        let err = factory(spec).unwrap_err();
        assert!(matches!(err, RunError::InvalidSpec(_)));
    }
}

#[test]
fn factory_parses_ntasks_cpus_per_task_account_and_additional_options() {
    let mut spec = valid_spec();
    spec["ntasks"] = Value::from(4);
    spec["cpus_per_task"] = Value::from(2);
    spec["account"] = Value::String("science".to_string());
    spec["additional_options"] = serde_json::json!(["--gres=gpu:1"]);
    let backend = factory(spec).unwrap();
    assert_eq!(backend.backend_type(), "slurm");
}

#[test]
fn render_script_includes_every_configured_directive() {
    let backend = SlurmBackend {
        spec: BackendSpec::default(),
        queue: "gpu".to_string(),
        time_limit: "01:30:00".to_string(),
        nodes: 4,
        ntasks: Some(8),
        cpus_per_task: Some(2),
        account: Some("science".to_string()),
        additional_options: vec!["--gres=gpu:1".to_string()],
        command: "./run-model".to_string(),
    };
    let tmp = tempdir().unwrap();
    let script = backend.render_script(&sample_run(), tmp.path());

    assert!(script.contains("#SBATCH --partition=gpu"));
    assert!(script.contains("#SBATCH --time=01:30:00"));
    assert!(script.contains("#SBATCH --nodes=4"));
    assert!(script.contains("#SBATCH --ntasks=8"));
    assert!(script.contains("#SBATCH --cpus-per-task=2"));
    assert!(script.contains("#SBATCH --account=science"));
    assert!(script.contains("#SBATCH --gres=gpu:1"));
    assert!(script.contains("./run-model"));
}
