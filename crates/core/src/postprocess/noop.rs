// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in `noop` postprocessor: reports success without touching
//! the run's output.

use super::{PostprocessError, PostprocessOutcome, Postprocessor};
use crate::container::ModelRun;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct NoopPostprocessor;

#[async_trait]
impl Postprocessor for NoopPostprocessor {
    fn postprocess_type(&self) -> &str {
        "noop"
    }

    async fn run(&self, _run: &ModelRun) -> PostprocessOutcome {
        PostprocessOutcome::empty()
    }
}

pub fn factory(_value: Value) -> Result<Box<dyn Postprocessor>, PostprocessError> {
    Ok(Box::new(NoopPostprocessor))
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
