// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in `noop` model variant: writes a single marker file and
//! nothing else. Used by the happy-path scenario tests and as a
//! reference implementation for third-party `model_type` variants.

use super::{ConfigError, ModelConfig};
use crate::container::ModelRun;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoopModelConfig {
    #[serde(default)]
    note: Option<String>,
}

impl ModelConfig for NoopModelConfig {
    fn model_type(&self) -> &str {
        "noop"
    }

    fn materialize(&self, run: &ModelRun, run_dir: &Path) -> Result<(), crate::generate::GenerateError> {
        let body = self.note.clone().unwrap_or_else(|| run.run_id.clone());
        std::fs::write(run_dir.join("noop.marker"), body)?;
        Ok(())
    }

    fn expected_markers(&self) -> Vec<String> {
        vec!["noop.marker".to_string()]
    }
}

/// Registry factory for `model_type: noop`.
pub fn factory(config: Value) -> Result<Box<dyn ModelConfig>, ConfigError> {
    let parsed: NoopModelConfig =
        serde_json::from_value(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(Box::new(parsed))
}

#[cfg(test)]
#[path = "noop_tests.rs"]
mod tests;
