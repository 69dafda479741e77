// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tidepool validate` - parse, template-expand, and resolve a config
//! document without materializing or running anything.

use crate::error::CliError;
use clap::Parser;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tidepool_core::{config, registry, ConfigSource, Context, ModelRun, PluginRegistry, TemplateEngine};

/// Parse, template-expand, and resolve a config document
#[derive(Parser)]
pub struct ValidateArgs {
    /// Path to the config document (YAML or JSON)
    config: PathBuf,
}

pub fn handle(args: ValidateArgs) -> Result<(), CliError> {
    let doc = load_and_expand(&args.config)?;
    let run = resolve(doc, registry::default_registry())?;
    println!(
        "OK: run_id={} start={} end={} interval={:?}",
        run.run_id, run.period.start, run.period.end, run.period.interval
    );
    Ok(())
}

/// Read `path` (file, or `CONFIG_FROM_ENV`-style env var handled upstream
/// by the caller) and expand every `${...}` template expression against
/// the process environment.
pub(crate) fn load_and_expand(path: &Path) -> Result<Value, CliError> {
    let doc = ConfigSource::File(path.to_path_buf()).load()?;
    let expanded = TemplateEngine::new().expand_document(doc, &Context::from_env())?;
    Ok(expanded)
}

pub(crate) fn resolve(doc: Value, registry: &PluginRegistry) -> Result<ModelRun, CliError> {
    config::resolve(doc, registry).map_err(CliError::from)
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
