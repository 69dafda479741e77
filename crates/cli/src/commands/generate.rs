// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tidepool generate` - run the Generate stage only.

use crate::commands::validate::{load_and_expand, resolve};
use crate::error::CliError;
use clap::Parser;
use std::path::PathBuf;
use tidepool_core::{generate, registry};

/// Run the Generate stage only
#[derive(Parser)]
pub struct GenerateArgs {
    /// Path to the config document (YAML or JSON)
    config: PathBuf,
    /// Override the document's `output_dir`
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

pub async fn handle(args: GenerateArgs) -> Result<(), CliError> {
    let mut doc = load_and_expand(&args.config)?;
    if let Some(output_dir) = &args.output_dir {
        doc["output_dir"] = serde_json::Value::String(output_dir.display().to_string());
    }
    let run = resolve(doc, registry::default_registry())?;

    let run_dir = generate::generate(&run).await?;
    println!("{}", run_dir.display());
    Ok(())
}

#[cfg(test)]
#[path = "generate_tests.rs"]
mod tests;
