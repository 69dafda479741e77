// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin Registry: process-wide name -> factory maps for every extension
//! point (configs, run backends, postprocessors, pipeline backends, data
//! sources).
//!
//! Discovery happens once at process start (`PluginRegistry::bootstrap`,
//! or a caller-assembled registry in tests). Lookups afterwards are
//! lock-free reads into immutable maps.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// The five extension points the registry tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginKind {
    Config,
    RunBackend,
    Postprocessor,
    PipelineBackend,
    DataSource,
}

impl PluginKind {
    fn label(self) -> &'static str {
        match self {
            PluginKind::Config => "config",
            PluginKind::RunBackend => "run backend",
            PluginKind::Postprocessor => "postprocessor",
            PluginKind::PipelineBackend => "pipeline backend",
            PluginKind::DataSource => "data source",
        }
    }
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{kind} '{name}' is already registered")]
    DuplicateName { kind: PluginKind, name: String },

    #[error("unknown {kind} '{name}' (available: [{}])", available.join(", "))]
    UnknownPlugin {
        kind: PluginKind,
        name: String,
        available: Vec<String>,
    },
}

/// A type-erased factory. Each extension point downcasts this back to its
/// own factory function type (`Arc<dyn Fn(...) -> ... + Send + Sync>`).
type Factory = Arc<dyn Any + Send + Sync>;

/// Process-wide directory of name -> factory mappings for every extension
/// point. Immutable after construction barring an explicit re-scan
/// (`register` on a fresh instance, or a future `rescan`).
#[derive(Default)]
pub struct PluginRegistry {
    entries: BTreeMap<(PluginKind, String), Factory>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `(kind, name)`. Fails if the pair is
    /// already taken; the registry never silently substitutes.
    pub fn register<F>(&mut self, kind: PluginKind, name: impl Into<String>, factory: F) -> Result<(), PluginError>
    where
        F: Send + Sync + 'static,
    {
        let name = name.into();
        let key = (kind, name.clone());
        if self.entries.contains_key(&key) {
            return Err(PluginError::DuplicateName { kind, name });
        }
        self.entries.insert(key, Arc::new(factory));
        Ok(())
    }

    /// Look up the factory registered for `(kind, name)` and downcast it
    /// to the caller's expected factory type `F`.
    pub fn lookup<F>(&self, kind: PluginKind, name: &str) -> Result<Arc<F>, PluginError>
    where
        F: Send + Sync + 'static,
    {
        let factory = self
            .entries
            .get(&(kind, name.to_string()))
            .ok_or_else(|| PluginError::UnknownPlugin {
                kind,
                name: name.to_string(),
                available: self.names(kind),
            })?;

        Arc::clone(factory)
            .downcast::<F>()
            .map_err(|_| PluginError::UnknownPlugin {
                kind,
                name: name.to_string(),
                available: self.names(kind),
            })
    }

    /// Stable, alphabetically-ordered list of names registered for `kind`.
    pub fn names(&self, kind: PluginKind) -> Vec<String> {
        self.entries
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn contains(&self, kind: PluginKind, name: &str) -> bool {
        self.entries.contains_key(&(kind, name.to_string()))
    }
}

/// Build a registry seeded with every built-in variant: the `noop`
/// config and postprocessor, and the `local`/`docker`/`slurm` run
/// backends. Third-party variants register into a clone of this before
/// it is handed to `config::resolve`.
pub fn builtins() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register(
            PluginKind::Config,
            "noop",
            crate::config::noop::factory as crate::config::ConfigFactory,
        )
        .expect("builtin registration cannot collide");
    registry
        .register(
            PluginKind::RunBackend,
            "local",
            crate::backend::local::factory as crate::backend::RunBackendFactory,
        )
        .expect("builtin registration cannot collide");
    registry
        .register(
            PluginKind::RunBackend,
            "docker",
            crate::backend::docker::factory as crate::backend::RunBackendFactory,
        )
        .expect("builtin registration cannot collide");
    registry
        .register(
            PluginKind::RunBackend,
            "slurm",
            crate::backend::slurm::factory as crate::backend::RunBackendFactory,
        )
        .expect("builtin registration cannot collide");
    registry
        .register(
            PluginKind::Postprocessor,
            "noop",
            crate::postprocess::noop::factory as crate::postprocess::PostprocessorFactory,
        )
        .expect("builtin registration cannot collide");
    registry
}

/// The process-wide default registry, built once on first use.
pub fn default_registry() -> &'static PluginRegistry {
    static REGISTRY: OnceLock<PluginRegistry> = OnceLock::new();
    REGISTRY.get_or_init(builtins)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
