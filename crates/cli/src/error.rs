// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI error type, distinguishing the two non-zero exit codes spec.md's
//! `6. EXTERNAL INTERFACES` names: 2 for a bad document/argument, 1 for
//! everything that fails while actually executing a stage.

use thiserror::Error;
use tidepool_core::{ConfigError, GenerateError, PipelineError, PluginError, RunError, TemplateError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Execution(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Execution(_) => 1,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Usage(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Usage(e.to_string())
    }
}

impl From<TemplateError> for CliError {
    fn from(e: TemplateError) -> Self {
        CliError::Usage(e.to_string())
    }
}

impl From<PluginError> for CliError {
    fn from(e: PluginError) -> Self {
        CliError::Usage(e.to_string())
    }
}

impl From<GenerateError> for CliError {
    fn from(e: GenerateError) -> Self {
        CliError::Execution(e.to_string())
    }
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        CliError::Usage(e.to_string())
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Config(inner) => inner.into(),
            PipelineError::MissingField(field) => {
                CliError::Usage(format!("document is missing required field '{field}'"))
            }
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
