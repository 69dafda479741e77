// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use tidepool_core::registry::builtins;

fn write_doc(dir: &Path, output_dir: &Path) -> PathBuf {
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

#[test]
fn load_and_expand_parses_yaml() {
    let tmp = tempdir().unwrap();
    let path = write_doc(tmp.path(), tmp.path());
    let doc = load_and_expand(&path).unwrap();
    assert_eq!(doc["run_id"], Value::String("run-1".to_string()));
}

#[test]
fn resolve_builds_a_model_run() {
    let tmp = tempdir().unwrap();
    let path = write_doc(tmp.path(), tmp.path());
    let doc = load_and_expand(&path).unwrap();
    let run = resolve(doc, &builtins()).unwrap();
    assert_eq!(run.run_id, "run-1");
}

#[test]
fn resolve_surfaces_config_errors_as_usage() {
    let tmp = tempdir().unwrap();
    let path = write_doc(tmp.path(), tmp.path());
    let mut doc = load_and_expand(&path).unwrap();
    doc["config"]["model_type"] = Value::String("does-not-exist".to_string());

    let err = resolve(doc, &builtins()).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn load_and_expand_rejects_a_missing_file() {
    let err = load_and_expand(Path::new("/no/such/file.yaml")).unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
