// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tidepool run` - Generate, then the Run stage, against a separately
//! supplied backend config document.

use crate::commands::validate::{load_and_expand, resolve};
use crate::error::CliError;
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;
use tidepool_core::backend::RunBackendFactory;
use tidepool_core::{generate, registry, CancellationToken, PluginKind};

/// Run Generate, then the Run stage
#[derive(Parser)]
pub struct RunArgs {
    /// Path to the config document (YAML or JSON)
    config: PathBuf,
    /// Path to the backend config document, discriminated by `type`
    #[arg(long)]
    backend_config: PathBuf,
    /// Stop after Generate
    #[arg(long)]
    dry_run: bool,
}

pub async fn handle(args: RunArgs) -> Result<(), CliError> {
    let doc = load_and_expand(&args.config)?;
    let run = resolve(doc, registry::default_registry())?;

    let run_dir = generate::generate(&run).await?;
    println!("generated: {}", run_dir.display());
    if args.dry_run {
        return Ok(());
    }

    let backend_spec = load_and_expand(&args.backend_config)?;
    let backend_type = backend_spec
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| CliError::Usage("backend config is missing discriminator field 'type'".to_string()))?
        .to_string();

    let registry = registry::default_registry();
    let factory = registry
        .lookup::<RunBackendFactory>(PluginKind::RunBackend, &backend_type)
        .map_err(CliError::from)?;
    let backend = (*factory)(backend_spec).map_err(CliError::from)?;

    let cancel = CancellationToken::new();
    let ctrlc_cancel = cancel.clone();
    let _ = ctrlc::set_handler(move || ctrlc_cancel.cancel());

    let outcome = backend.launch(&run, &run_dir, &cancel).await;
    println!("state: {:?}", outcome.state);
    if !outcome.log_tail.is_empty() {
        println!("--- log tail ---\n{}", outcome.log_tail);
    }

    if outcome.is_success() {
        Ok(())
    } else {
        Err(CliError::Execution(format!("run did not succeed: {:?}", outcome.state)))
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
