// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn factory_requires_exactly_one_of_image_or_dockerfile() {
    let err = factory(serde_json::json!({})).unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::InvariantViolated { .. })));
}

#[test]
fn factory_rejects_both_image_and_dockerfile() {
    let err = factory(serde_json::json!({"image": "x", "dockerfile": "./Dockerfile"})).unwrap_err();
    assert!(matches!(err, RunError::Config(ConfigError::InvariantViolated { field, .. }) if field == "image|dockerfile"));
}

#[test]
fn factory_builds_with_image_only() {
    let backend = factory(serde_json::json!({"image": "models/forecast:latest"})).unwrap();
    assert_eq!(backend.backend_type(), "docker");
}

#[test]
fn factory_builds_with_dockerfile_only() {
    let backend = factory(serde_json::json!({"dockerfile": "./Dockerfile"})).unwrap();
    assert_eq!(backend.backend_type(), "docker");
}

#[test]
fn factory_accepts_valid_memory_strings() {
    for memory in ["512m", "4g", "1m"] {
        factory(serde_json::json!({"image": "x", "memory": memory})).unwrap();
    }
}

#[test]
fn factory_rejects_malformed_memory() {
    for memory in ["4GB", "big", "-1g", ""] {
        let err = factory(serde_json::json!({"image": "x", "memory": memory})).unwrap_err();
        assert!(matches!(err, RunError::InvalidSpec(_)));
    }
}

#[test]
fn factory_rejects_non_string_image() {
    let err = factory(serde_json::json!({"image": 7})).unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn cpu_accepts_the_boundary_values() {
    for cpu in [1, 128] {
        factory(serde_json::json!({"image": "x", "cpu": cpu})).unwrap();
    }
}

#[test]
fn cpu_rejects_values_outside_the_boundary() {
    for cpu in [0, 129] {
        let err = factory(serde_json::json!({"image": "x", "cpu": cpu})).unwrap_err();
        assert!(matches!(err, RunError::InvalidSpec(_)));
    }
}

#[test]
fn factory_parses_build_args() {
    let backend = factory(serde_json::json!({
        "dockerfile": "./Dockerfile",
        "build_args": {"VERSION": "1.2.3"},
    }))
    .unwrap();
    assert_eq!(backend.backend_type(), "docker");
}

#[test]
fn factory_rejects_non_string_build_arg_values() {
    let err = factory(serde_json::json!({
        "dockerfile": "./Dockerfile",
        "build_args": {"VERSION": 123},
    }))
    .unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn factory_validates_volume_host_paths_exist() {
    let err = factory(serde_json::json!({
        "image": "x",
        "volumes": ["/does/not/exist:/data"],
    }))
    .unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn factory_accepts_a_volume_with_an_existing_host_path() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = factory(serde_json::json!({
        "image": "x",
        "volumes": [format!("{}:/data:ro", tmp.path().display())],
    }))
    .unwrap();
    assert_eq!(backend.backend_type(), "docker");
}

#[test]
fn factory_rejects_malformed_volume_spec() {
    let err = factory(serde_json::json!({"image": "x", "volumes": ["no-colon-here"]})).unwrap_err();
    assert!(matches!(err, RunError::InvalidSpec(_)));
}

#[test]
fn factory_parses_user_executable_mpiexec_and_remove_container() {
    let backend = factory(serde_json::json!({
        "image": "x",
        "user": "1000:1000",
        "executable": "./run-model",
        "mpiexec": "mpiexec -n 4",
        "remove_container": false,
    }))
    .unwrap();
    assert_eq!(backend.backend_type(), "docker");
}
