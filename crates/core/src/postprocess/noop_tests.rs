// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::{NoopModelConfig, TimeRange};
use chrono::{TimeZone, Utc};
use std::time::Duration;

fn sample_run() -> ModelRun {
    ModelRun::new(
        "run-1".to_string(),
        TimeRange {
            start: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap(),
            interval: Duration::from_secs(3600),
        },
        std::path::PathBuf::from("/tmp/out"),
        Box::new(NoopModelConfig::default()),
        false,
    )
}

#[tokio::test]
async fn run_reports_no_artifacts() {
    let outcome = NoopPostprocessor.run(&sample_run()).await;
    assert!(outcome.success);
    assert!(outcome.artifacts.is_empty());
    assert!(outcome.notes.is_empty());
}

#[test]
fn postprocess_type_is_noop() {
    assert_eq!(NoopPostprocessor.postprocess_type(), "noop");
}

#[test]
fn factory_ignores_its_input() {
    let postprocessor = factory(serde_json::json!({"anything": true})).unwrap();
    assert_eq!(postprocessor.postprocess_type(), "noop");
}
