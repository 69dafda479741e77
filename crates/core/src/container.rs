// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Model-Run Container: the single value threaded through
//! Generate -> Run -> Postprocess for one invocation.

use crate::config::{ModelConfig, TimeRange};
use std::path::PathBuf;

/// One resolved, ready-to-execute run. Built once by `config::resolve`
/// and never mutated afterwards; each stage reads it and returns its own
/// outcome rather than writing back into it.
pub struct ModelRun {
    pub run_id: String,
    pub period: TimeRange,
    pub output_dir: PathBuf,
    pub config: Box<dyn ModelConfig>,
    pub delete_existing: bool,
}

impl std::fmt::Debug for ModelRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRun")
            .field("run_id", &self.run_id)
            .field("period", &self.period)
            .field("output_dir", &self.output_dir)
            .field("model_type", &self.config.model_type())
            .field("delete_existing", &self.delete_existing)
            .finish()
    }
}

impl ModelRun {
    pub fn new(
        run_id: String,
        period: TimeRange,
        output_dir: PathBuf,
        config: Box<dyn ModelConfig>,
        delete_existing: bool,
    ) -> Self {
        Self {
            run_id,
            period,
            output_dir,
            config,
            delete_existing,
        }
    }

    /// The Staging Directory: `output_dir/run_id/`. Generate materializes
    /// inputs into it, Run executes from it and writes outputs alongside
    /// them, and Postprocess reads from the same path.
    pub fn run_dir(&self) -> PathBuf {
        self.output_dir.join(&self.run_id)
    }

    /// Advisory lock file path, used to enforce single ownership of a
    /// run's directory. Kept as a sibling of `run_dir` rather than inside
    /// it, so an empty-directory check on `run_dir` is never vacuously
    /// satisfied by the lock file itself.
    pub fn lock_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.lock", self.run_id))
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
