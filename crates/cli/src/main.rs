// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tidepool - thin CLI dispatcher over `tidepool-core`'s Generate / Run /
//! Postprocess pipeline. Argument parsing only; every behavior lives in
//! the core crate.

mod commands;
mod completions;
mod error;

use clap::{Parser, Subcommand};
use commands::{backends, generate, pipeline, run, validate};
use completions::CompletionsArgs;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "tidepool",
    version,
    about = "Generate/Run/Postprocess pipeline runner for declarative model configs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, template-expand, and resolve a config document without running it
    Validate(validate::ValidateArgs),
    /// Run the Generate stage only
    Generate(generate::GenerateArgs),
    /// Run Generate, then the Run stage
    Run(run::RunArgs),
    /// Run Generate, Run, and Postprocess
    Pipeline(pipeline::PipelineArgs),
    /// Inspect the plugin registry
    Backends(backends::BackendsArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate(args) => validate::handle(args),
        Commands::Generate(args) => generate::handle(args).await,
        Commands::Run(args) => run::handle(args).await,
        Commands::Pipeline(args) => pipeline::handle(args).await,
        Commands::Backends(args) => backends::handle(args),
        Commands::Completions(args) => {
            completions::generate_completions::<Cli>(args.shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
