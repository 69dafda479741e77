// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tidepool backends` - plugin registry introspection.

use crate::commands::validate::load_and_expand;
use crate::error::CliError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tidepool_core::backend::RunBackendFactory;
use tidepool_core::{registry, PluginKind};

#[derive(Parser)]
pub struct BackendsArgs {
    #[command(subcommand)]
    command: BackendsCommand,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendKind {
    Config,
    RunBackend,
    Postprocessor,
}

impl From<BackendKind> for PluginKind {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Config => PluginKind::Config,
            BackendKind::RunBackend => PluginKind::RunBackend,
            BackendKind::Postprocessor => PluginKind::Postprocessor,
        }
    }
}

#[derive(Subcommand)]
enum BackendsCommand {
    /// List every registered variant of a plugin kind
    List {
        #[arg(long, value_enum, default_value_t = BackendKind::RunBackend)]
        kind: BackendKind,
    },
    /// Construct a run backend from a config document and report whether it parses
    Validate {
        /// Path to a backend config document, discriminated by `type`
        config: PathBuf,
    },
    /// Print the fields a run backend variant's config expects
    Schema {
        /// Registered backend name (`local`, `docker`, `slurm`, ...)
        name: String,
    },
    /// Write a minimal example config document for a run backend variant
    Create {
        /// Registered backend name (`local`, `docker`, `slurm`, ...)
        name: String,
        /// Where to write the example document
        output: PathBuf,
    },
}

pub fn handle(args: BackendsArgs) -> Result<(), CliError> {
    match args.command {
        BackendsCommand::List { kind } => {
            let registry = registry::default_registry();
            for name in registry.names(kind.into()) {
                println!("{name}");
            }
            Ok(())
        }
        BackendsCommand::Validate { config } => {
            let spec = load_and_expand(&config)?;
            let backend_type = spec
                .get("type")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| CliError::Usage("config is missing discriminator field 'type'".to_string()))?
                .to_string();
            let registry = registry::default_registry();
            let factory = registry
                .lookup::<RunBackendFactory>(PluginKind::RunBackend, &backend_type)
                .map_err(CliError::from)?;
            (*factory)(spec).map_err(CliError::from)?;
            println!("OK: '{backend_type}' config is valid");
            Ok(())
        }
        BackendsCommand::Schema { name } => {
            println!("{}", schema_for(&name)?);
            Ok(())
        }
        BackendsCommand::Create { name, output } => {
            std::fs::write(&output, example_for(&name)?)?;
            println!("wrote {}", output.display());
            Ok(())
        }
    }
}

fn schema_for(name: &str) -> Result<&'static str, CliError> {
    match name {
        "local" => Ok(concat!(
            "type: local\ncommand: string (required)\n",
            "timeout_seconds: duration string or integer seconds, 60..=86400 (optional)\n",
            "grace_period: duration string (default 5s)\n",
            "env_vars: map of string to string (optional)\nworking_dir: path, must exist (optional)",
        )),
        "docker" => Ok(concat!(
            "type: docker\nimage: string (exactly one of image/dockerfile, required)\n",
            "dockerfile: path (exactly one of image/dockerfile, required)\n",
            "build_args: map of string to string (optional)\ncpu: integer, 1..=128 (optional)\n",
            "memory: string matching ^\\d+[mg]$ (optional)\n",
            "volumes: list of \"host:container[:mode]\" strings, host path must exist (optional)\n",
            "user: string (optional)\nexecutable: string (optional)\nmpiexec: string (optional)\n",
            "remove_container: bool (default true)\n",
            "timeout_seconds: duration string or integer seconds, 60..=86400 (optional)\n",
            "grace_period: duration string (default 5s)\n",
            "env_vars: map of string to string (optional)\nworking_dir: path, must exist (optional)",
        )),
        "slurm" => Ok(concat!(
            "type: slurm\nqueue: string (required)\ntime_limit: string matching HH:MM:SS (required)\n",
            "command: string (required)\nnodes: integer, 1..=100 (default 1)\n",
            "ntasks: integer (optional)\ncpus_per_task: integer (optional)\n",
            "account: string (optional)\nadditional_options: list of strings (optional)\n",
            "timeout_seconds: duration string or integer seconds, 60..=86400 (optional)\n",
            "grace_period: duration string (default 5s)\n",
            "env_vars: map of string to string (optional)\nworking_dir: path, must exist (optional)",
        )),
        other => Err(CliError::Usage(format!("no schema for backend '{other}'"))),
    }
}

fn example_for(name: &str) -> Result<&'static str, CliError> {
    match name {
        "local" => Ok("type: local\ncommand: \"./run_model.sh\"\ntimeout_seconds: \"2h\"\n"),
        "docker" => Ok("type: docker\nimage: \"myorg/mymodel:latest\"\nmemory: \"4g\"\ntimeout_seconds: \"2h\"\n"),
        "slurm" => Ok("type: slurm\nqueue: \"compute\"\ntime_limit: \"01:00:00\"\ncommand: \"./run_model.sh\"\n"),
        other => Err(CliError::Usage(format!("no example for backend '{other}'"))),
    }
}

#[cfg(test)]
#[path = "backends_tests.rs"]
mod tests;
