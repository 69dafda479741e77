// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::backend::{RunBackendFactory, RunOutcome, RunState};
use crate::cancel::CancellationToken;
use crate::config::{self, ConfigError};
use crate::container::ModelRun;
use crate::generate;
use crate::postprocess::{PostprocessOutcome, PostprocessorFactory};
use crate::registry::{PluginKind, PluginRegistry};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur before a `ModelRun` is resolved, i.e. before
/// there is a `run_id` to attach a `PipelineResult` to. Every failure
/// from Generate onward is instead folded into the returned
/// `PipelineResult`'s `success`/`error` fields.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("document is missing required field '{0}'")]
    MissingField(&'static str),
}

/// Policy knobs for one `run_pipeline` invocation.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Remove the run directory when Generate or Run fails. Always
    /// removed on success regardless of this flag.
    pub cleanup_on_failure: bool,
    /// After Generate, before Run, require the run directory to be
    /// non-empty and (if the config declares any) to carry its expected
    /// marker files.
    pub validate_stages: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cleanup_on_failure: true,
            validate_stages: true,
        }
    }
}

/// What came out of one pipeline run, per the Pipeline Result data model:
/// `success` iff every stage in `stages_completed` ran, in order, through
/// to `["generate", "run", "postprocess"]`.
#[derive(Debug)]
pub struct PipelineResult {
    pub success: bool,
    pub run_id: String,
    pub stages_completed: Vec<String>,
    pub error: Option<String>,
    pub run_outcome: Option<RunOutcome>,
    pub postprocess_result: Option<PostprocessOutcome>,
    pub cleaned_up: bool,
}

/// Drive `document` through Generate, Run, and (on success) Postprocess.
///
/// `document` must already be template-expanded. Besides the `run_id` /
/// `period` / `output_dir` / `config` fields `config::resolve` reads, it
/// must carry a `backend` subtree with a `type` discriminator, and may
/// carry an optional `postprocess` subtree (defaulting to `{"type":
/// "noop"}` when absent).
///
/// Never returns `Err` once a `ModelRun` has been resolved: from that
/// point on every failure mode is folded into the returned
/// `PipelineResult` per the Pipeline Coordinator's seven-step algorithm.
/// Errors before resolution (a malformed document) still propagate as
/// `PipelineError`, since no `run_id` exists yet to attach a Result to.
pub async fn run_pipeline(
    document: Value,
    registry: &PluginRegistry,
    cancel: &CancellationToken,
    options: &PipelineOptions,
) -> Result<PipelineResult, PipelineError> {
    let backend_spec = document
        .get("backend")
        .cloned()
        .ok_or(PipelineError::MissingField("backend"))?;
    let postprocess_spec = document
        .get("postprocess")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type": "noop"}));

    let run = config::resolve(document, registry)?;
    let mut stages_completed = Vec::new();

    // Step 2: Generate.
    let run_dir = match generate::generate(&run).await {
        Ok(dir) => dir,
        Err(e) => {
            let cleaned_up = if options.cleanup_on_failure { cleanup(&run) } else { false };
            tracing::warn!(run_id = %run.run_id, error = %e, cleaned_up, "generate failed");
            return Ok(failure_result(&run, stages_completed, e.to_string(), cleaned_up));
        }
    };
    stages_completed.push("generate".to_string());

    // Step 3: validate_stages, gated between Generate and Run.
    if options.validate_stages {
        if let Err(reason) = validate_stages(&run, &run_dir) {
            let cleaned_up = if options.cleanup_on_failure { cleanup(&run) } else { false };
            tracing::warn!(run_id = %run.run_id, reason, cleaned_up, "validate_stages failed");
            return Ok(failure_result(&run, stages_completed, reason, cleaned_up));
        }
    }

    // Step 4: Run with the selected backend.
    let backend_type = match backend_spec.get("type").and_then(Value::as_str) {
        Some(t) => t.to_string(),
        None => {
            let cleaned_up = if options.cleanup_on_failure { cleanup(&run) } else { false };
            return Ok(failure_result(
                &run,
                stages_completed,
                "document is missing required field 'backend.type'".to_string(),
                cleaned_up,
            ));
        }
    };
    let backend = match registry
        .lookup::<RunBackendFactory>(PluginKind::RunBackend, &backend_type)
        .map_err(|e| e.to_string())
        .and_then(|factory| (*factory)(backend_spec).map_err(|e| e.to_string()))
    {
        Ok(backend) => backend,
        Err(e) => {
            let cleaned_up = if options.cleanup_on_failure { cleanup(&run) } else { false };
            return Ok(failure_result(&run, stages_completed, e.to_string(), cleaned_up));
        }
    };

    let run_outcome = backend.launch(&run, &run_dir, cancel).await;
    if !run_outcome.is_success() {
        let cleaned_up = if options.cleanup_on_failure { cleanup(&run) } else { false };
        tracing::warn!(run_id = %run.run_id, state = ?run_outcome.state, cleaned_up, "run did not succeed");
        return Ok(PipelineResult {
            success: false,
            run_id: run.run_id.clone(),
            stages_completed,
            error: Some(format!("{:?}", run_outcome.state)),
            run_outcome: Some(run_outcome),
            postprocess_result: None,
            cleaned_up,
        });
    }
    stages_completed.push("run".to_string());

    // Step 5: Postprocess. Never propagates as an exception; a setup-time
    // failure (unknown type, bad config subtree) is folded into a failed
    // outcome just like a postprocessor-internal failure would be.
    let postprocess_result = run_postprocess(&run, postprocess_spec, registry).await;
    if postprocess_result.success {
        stages_completed.push("postprocess".to_string());
    }

    // Step 6: cleanup_on_failure never applies here since Generate and Run
    // both succeeded; the run directory is always retained for Postprocess
    // output unless the caller also wants it gone, which is a step 6
    // policy only for Generate/Run failures.
    let cleaned_up = false;

    tracing::info!(run_id = %run.run_id, success = postprocess_result.success, "pipeline finished");

    Ok(PipelineResult {
        success: postprocess_result.success,
        run_id: run.run_id.clone(),
        error: if postprocess_result.success {
            None
        } else {
            postprocess_result.error.clone()
        },
        stages_completed,
        run_outcome: Some(run_outcome),
        postprocess_result: Some(postprocess_result),
        cleaned_up,
    })
}

fn failure_result(run: &ModelRun, stages_completed: Vec<String>, error: String, cleaned_up: bool) -> PipelineResult {
    PipelineResult {
        success: false,
        run_id: run.run_id.clone(),
        stages_completed,
        error: Some(error),
        run_outcome: None,
        postprocess_result: None,
        cleaned_up,
    }
}

async fn run_postprocess(run: &ModelRun, spec: Value, registry: &PluginRegistry) -> PostprocessOutcome {
    let postprocess_type = spec.get("type").and_then(Value::as_str).unwrap_or("noop").to_string();

    let factory = match registry.lookup::<PostprocessorFactory>(PluginKind::Postprocessor, &postprocess_type) {
        Ok(factory) => factory,
        Err(e) => return PostprocessOutcome::failed(e.to_string()),
    };
    let postprocessor = match (*factory)(spec) {
        Ok(postprocessor) => postprocessor,
        Err(e) => return PostprocessOutcome::failed(e.to_string()),
    };
    postprocessor.run(run).await
}

/// spec.md §4.7 step 3: the run directory must be non-empty after
/// Generate, and every marker the config declared via `expected_markers`
/// must be present.
fn validate_stages(run: &ModelRun, run_dir: &std::path::Path) -> Result<(), String> {
    let non_empty = std::fs::read_dir(run_dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if !non_empty {
        return Err("validate_stages: run directory is empty after generate".to_string());
    }

    let missing: Vec<String> = run
        .config
        .expected_markers()
        .into_iter()
        .filter(|marker| !run_dir.join(marker).exists())
        .collect();
    if !missing.is_empty() {
        return Err(format!(
            "validate_stages: expected marker(s) missing after generate: {}",
            missing.join(", ")
        ));
    }

    Ok(())
}

fn cleanup(run: &ModelRun) -> bool {
    std::fs::remove_dir_all(run.run_dir()).is_ok()
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
