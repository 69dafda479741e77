// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn hi() -> &'static str {
    "hi"
}

#[test]
fn register_then_lookup_roundtrips() {
    let mut registry = PluginRegistry::new();
    registry
        .register(PluginKind::Config, "noop_model", hi as fn() -> &'static str)
        .unwrap();

    let factory = registry
        .lookup::<fn() -> &'static str>(PluginKind::Config, "noop_model")
        .unwrap();
    assert_eq!(factory(), "hi");
}

#[test]
fn duplicate_register_fails() {
    let mut registry = PluginRegistry::new();
    registry.register(PluginKind::Config, "dup", 1u32).unwrap();

    let err = registry.register(PluginKind::Config, "dup", 2u32).unwrap_err();
    match err {
        PluginError::DuplicateName { kind, name } => {
            assert_eq!(kind, PluginKind::Config);
            assert_eq!(name, "dup");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn lookup_unknown_lists_available_names() {
    let mut registry = PluginRegistry::new();
    registry.register(PluginKind::RunBackend, "local", 1u32).unwrap();
    registry.register(PluginKind::RunBackend, "docker", 2u32).unwrap();

    let err = registry
        .lookup::<u32>(PluginKind::RunBackend, "slurm")
        .unwrap_err();
    match err {
        PluginError::UnknownPlugin { kind, name, available } => {
            assert_eq!(kind, PluginKind::RunBackend);
            assert_eq!(name, "slurm");
            assert_eq!(available, vec!["docker".to_string(), "local".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn names_are_alphabetical_and_scoped_to_kind() {
    let mut registry = PluginRegistry::new();
    registry.register(PluginKind::Config, "zzz_model", 1u32).unwrap();
    registry.register(PluginKind::Config, "aaa_model", 2u32).unwrap();
    registry.register(PluginKind::Postprocessor, "noop", 3u32).unwrap();

    assert_eq!(
        registry.names(PluginKind::Config),
        vec!["aaa_model".to_string(), "zzz_model".to_string()]
    );
    assert_eq!(registry.names(PluginKind::Postprocessor), vec!["noop".to_string()]);
}

#[test]
fn builtins_registers_every_expected_variant() {
    let registry = builtins();
    assert_eq!(registry.names(PluginKind::Config), vec!["noop".to_string()]);
    assert_eq!(
        registry.names(PluginKind::RunBackend),
        vec!["docker".to_string(), "local".to_string(), "slurm".to_string()]
    );
    assert_eq!(registry.names(PluginKind::Postprocessor), vec!["noop".to_string()]);
}

#[test]
fn default_registry_is_stable_across_calls() {
    assert!(std::ptr::eq(default_registry(), default_registry()));
}

#[test]
fn different_kinds_with_same_name_do_not_collide() {
    let mut registry = PluginRegistry::new();
    registry.register(PluginKind::Config, "noop", 1u32).unwrap();
    registry
        .register(PluginKind::Postprocessor, "noop", 2u32)
        .unwrap();

    assert!(registry.contains(PluginKind::Config, "noop"));
    assert!(registry.contains(PluginKind::Postprocessor, "noop"));
}
