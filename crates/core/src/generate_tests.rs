// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{ModelConfig, NoopModelConfig, TimeRange};
use chrono::{TimeZone, Utc};
use std::time::Duration;
use tempfile::tempdir;

#[derive(Debug)]
struct FailingConfig;

impl ModelConfig for FailingConfig {
    fn model_type(&self) -> &str {
        "failing"
    }

    fn materialize(&self, _run: &ModelRun, _run_dir: &std::path::Path) -> Result<(), GenerateError> {
        Err(GenerateError::Materialize("boom".to_string()))
    }
}

fn period() -> TimeRange {
    TimeRange {
        start: Utc.with_ymd_and_hms(2023, 1, 15, 0, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2023, 1, 16, 0, 0, 0).unwrap(),
        interval: Duration::from_secs(3600),
    }
}

fn run_with(output_dir: std::path::PathBuf, config: Box<dyn ModelConfig>) -> ModelRun {
    ModelRun::new("run-1".to_string(), period(), output_dir, config, false)
}

#[tokio::test]
async fn generate_creates_run_dir_and_runs_materialize() {
    let tmp = tempdir().unwrap();
    let run = run_with(tmp.path().to_path_buf(), Box::new(NoopModelConfig::default()));

    let run_dir = generate(&run).await.unwrap();
    assert!(run_dir.exists());
    assert_eq!(run_dir, run.run_dir());
}

#[tokio::test]
async fn generate_surfaces_materialize_errors() {
    let tmp = tempdir().unwrap();
    let run = run_with(tmp.path().to_path_buf(), Box::new(FailingConfig));

    let err = generate(&run).await.unwrap_err();
    assert!(matches!(err, GenerateError::Materialize(msg) if msg.contains("boom")));
}

#[tokio::test]
async fn generate_holds_an_exclusive_lock() {
    let tmp = tempdir().unwrap();
    let run = run_with(tmp.path().to_path_buf(), Box::new(NoopModelConfig::default()));

    std::fs::create_dir_all(run.run_dir()).unwrap();
    std::fs::write(run.lock_path(), b"").unwrap();

    let err = generate(&run).await.unwrap_err();
    assert!(matches!(err, GenerateError::LockHeld(_)));
}

#[tokio::test]
async fn generate_releases_lock_after_success() {
    let tmp = tempdir().unwrap();
    let run = run_with(tmp.path().to_path_buf(), Box::new(NoopModelConfig::default()));

    generate(&run).await.unwrap();
    assert!(!run.lock_path().exists());
}
