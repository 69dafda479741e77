// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postprocess stage: runs after a successful Run, reading the run
//! directory and optionally writing derived artifacts alongside it.

pub(crate) mod noop;

pub use noop::NoopPostprocessor;

use crate::container::ModelRun;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostprocessError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("postprocess step failed: {0}")]
    Failed(String),
}

/// What a postprocessor reports back once it's done with a run's output.
/// Never carries a `Result`: a postprocessor that fails reports
/// `success=false` with a reason rather than propagating an exception
/// across the stage boundary, mirroring `RunBackend::launch`'s
/// `RunOutcome`.
#[derive(Debug, Clone)]
pub struct PostprocessOutcome {
    pub success: bool,
    pub artifacts: Vec<std::path::PathBuf>,
    pub notes: Vec<String>,
    pub error: Option<String>,
}

impl PostprocessOutcome {
    pub fn empty() -> Self {
        Self {
            success: true,
            artifacts: Vec::new(),
            notes: Vec::new(),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            artifacts: Vec::new(),
            notes: Vec::new(),
            error: Some(reason.into()),
        }
    }
}

/// A postprocessor registered under its own `postprocess_type`
/// discriminator, run once Run reports success.
#[async_trait]
pub trait Postprocessor: Send + Sync + std::fmt::Debug {
    fn postprocess_type(&self) -> &str;

    /// Never returns `Err`: failures surface as `PostprocessOutcome {
    /// success: false, error: Some(reason), .. }`.
    async fn run(&self, run: &ModelRun) -> PostprocessOutcome;
}

/// Factory for a registered postprocessor variant: raw `postprocess`
/// subtree in, constructed `Postprocessor` out.
pub type PostprocessorFactory = fn(Value) -> Result<Box<dyn Postprocessor>, PostprocessError>;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
