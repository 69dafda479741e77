// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn write_doc(dir: &std::path::Path, output_dir: &std::path::Path) -> PathBuf {
    let path = dir.join("run.yaml");
    std::fs::write(
        &path,
        format!(
            "run_id: run-1\nperiod:\n  start: \"2023-01-15T00:00:00Z\"\n  duration: 1h\n  interval: 1h\noutput_dir: {}\nconfig:\n  model_type: noop\n",
            output_dir.display()
        ),
    )
    .unwrap();
    path
}

#[tokio::test]
async fn handle_writes_a_marker_under_the_run_dir() {
    let tmp = tempdir().unwrap();
    let config_path = write_doc(tmp.path(), tmp.path());

    handle(GenerateArgs {
        config: config_path,
        output_dir: None,
    })
    .await
    .unwrap();

    assert!(tmp.path().join("run-1/noop.marker").exists());
}

#[tokio::test]
async fn handle_honors_an_output_dir_override() {
    let tmp = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    let config_path = write_doc(tmp.path(), tmp.path());

    handle(GenerateArgs {
        config: config_path,
        output_dir: Some(elsewhere.path().to_path_buf()),
    })
    .await
    .unwrap();

    assert!(elsewhere.path().join("run-1/noop.marker").exists());
    assert!(!tmp.path().join("run-1").exists());
}
