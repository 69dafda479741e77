// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tidepool pipeline` - run Generate, Run, and Postprocess end to end.

use crate::commands::validate::load_and_expand;
use crate::error::CliError;
use clap::Parser;
use std::path::PathBuf;
use tidepool_core::{pipeline, registry, CancellationToken, PipelineOptions};

/// Run Generate, Run, and Postprocess
#[derive(Parser)]
pub struct PipelineArgs {
    /// Path to the config document (YAML or JSON)
    config: PathBuf,
    /// Path to the backend config document, discriminated by `type`
    #[arg(long)]
    run_backend: PathBuf,
    /// Path to the postprocessor config document, discriminated by `type`
    #[arg(long)]
    processor: Option<PathBuf>,
    /// Remove the run directory when Generate or Run fails
    #[arg(long, default_value_t = true)]
    cleanup_on_failure: bool,
    /// Require the run directory to carry every expected marker before
    /// handing off to Run
    #[arg(long, default_value_t = true)]
    validate_stages: bool,
}

pub async fn handle(args: PipelineArgs) -> Result<(), CliError> {
    let mut doc = load_and_expand(&args.config)?;
    doc["backend"] = load_and_expand(&args.run_backend)?;
    if let Some(processor) = &args.processor {
        doc["postprocess"] = load_and_expand(processor)?;
    }

    let options = PipelineOptions {
        cleanup_on_failure: args.cleanup_on_failure,
        validate_stages: args.validate_stages,
    };
    let cancel = CancellationToken::new();
    let ctrlc_cancel = cancel.clone();
    let _ = ctrlc::set_handler(move || ctrlc_cancel.cancel());

    let result = pipeline::run_pipeline(doc, registry::default_registry(), &cancel, &options).await?;

    println!("run_id: {}", result.run_id);
    println!("stages_completed: {}", result.stages_completed.join(", "));
    match &result.run_outcome {
        Some(outcome) => println!("state: {:?}", outcome.state),
        None => println!("state: not reached"),
    }
    println!("cleaned_up: {}", result.cleaned_up);
    match &result.postprocess_result {
        Some(outcome) if outcome.success => {
            println!("postprocess: ok ({} artifact(s))", outcome.artifacts.len());
            for note in &outcome.notes {
                println!("  note: {note}");
            }
        }
        Some(outcome) => println!(
            "postprocess: failed ({})",
            outcome.error.as_deref().unwrap_or("unknown reason")
        ),
        None => println!("postprocess: skipped"),
    }

    if result.success {
        Ok(())
    } else {
        Err(CliError::Execution(format!(
            "pipeline did not succeed: {}",
            result.error.as_deref().unwrap_or("unknown reason")
        )))
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
