// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Generate stage: stages a `ModelRun`'s inputs into a private scratch
//! directory before Run ever touches them.

use crate::container::ModelRun;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("staging directory {0:?} is locked by another run")]
    LockHeld(PathBuf),

    #[error("materialize failed: {0}")]
    Materialize(String),
}

/// Prepare `run`'s staging directory, acquire its advisory lock, and
/// delegate content generation to the run's `ModelConfig`.
///
/// Returns the staging directory once `materialize` has run. The
/// directory is left on disk for Run to read from and write into;
/// callers are responsible for tearing it down after Run and Postprocess
/// finish (or on cleanup-on-failure). Whether the materialized output
/// actually satisfies the config's `expected_markers()` is the Pipeline
/// Coordinator's `validate_stages` concern, not Generate's.
pub async fn generate(run: &ModelRun) -> Result<PathBuf, GenerateError> {
    let run_dir = run.run_dir();
    let lock_path = run.lock_path();

    prepare_dir(&run_dir, run.delete_existing)?;
    let _lock = acquire_lock(&lock_path)?;

    run.config
        .materialize(run, &run_dir)
        .map_err(|e| GenerateError::Materialize(e.to_string()))?;

    Ok(run_dir)
}

fn prepare_dir(run_dir: &std::path::Path, delete_existing: bool) -> Result<(), GenerateError> {
    if run_dir.exists() {
        if !delete_existing {
            return Ok(());
        }
        std::fs::remove_dir_all(run_dir)?;
    }
    std::fs::create_dir_all(run_dir)?;
    Ok(())
}

struct StagingLock {
    path: PathBuf,
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn acquire_lock(lock_path: &std::path::Path) -> Result<StagingLock, GenerateError> {
    match std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(lock_path)
    {
        Ok(_) => Ok(StagingLock {
            path: lock_path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(GenerateError::LockHeld(lock_path.to_path_buf()))
        }
        Err(e) => Err(GenerateError::Io(e)),
    }
}

#[cfg(test)]
#[path = "generate_tests.rs"]
mod tests;
