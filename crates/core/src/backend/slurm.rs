// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `slurm` backend: constructs a submission script from the backend
//! config, submits it via `sbatch`, polls `squeue` until it leaves the
//! queue, and `scancel`s it on timeout or cancellation.

use super::{BackendSpec, RunBackend, RunError, RunOutcome, RunState};
use crate::cancel::CancellationToken;
use crate::container::ModelRun;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const SUBMIT_SCRIPT_NAME: &str = ".tidepool-submit.sh";

#[derive(Debug, Clone)]
pub struct SlurmBackend {
    spec: BackendSpec,
    queue: String,
    time_limit: String,
    nodes: u32,
    ntasks: Option<u32>,
    cpus_per_task: Option<u32>,
    account: Option<String>,
    additional_options: Vec<String>,
    command: String,
}

impl SlurmBackend {
    pub fn new(queue: impl Into<String>, time_limit: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            spec: BackendSpec::default(),
            queue: queue.into(),
            time_limit: time_limit.into(),
            nodes: 1,
            ntasks: None,
            cpus_per_task: None,
            account: None,
            additional_options: Vec::new(),
            command: command.into(),
        }
    }

    pub fn with_spec(mut self, spec: BackendSpec) -> Self {
        self.spec = spec;
        self
    }
}

pub fn factory(value: Value) -> Result<Box<dyn RunBackend>, RunError> {
    let queue = value
        .get("queue")
        .and_then(Value::as_str)
        .ok_or_else(|| RunError::InvalidSpec("'queue' is required for the slurm backend".to_string()))?
        .to_string();

    let time_limit = value
        .get("time_limit")
        .and_then(Value::as_str)
        .ok_or_else(|| RunError::InvalidSpec("'time_limit' is required for the slurm backend".to_string()))?
        .to_string();
    if !time_limit_pattern().is_match(&time_limit) {
        return Err(RunError::InvalidSpec(format!(
            "'time_limit' must match HH:MM:SS, got '{time_limit}'"
        )));
    }

    let command = value
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| RunError::InvalidSpec("'command' is required for the slurm backend".to_string()))?
        .to_string();

    let nodes = match value.get("nodes") {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => {
            let nodes = n
                .as_u64()
                .ok_or_else(|| RunError::InvalidSpec("'nodes' must be a positive integer".to_string()))?;
            if !(1..=100).contains(&nodes) {
                return Err(RunError::InvalidSpec(format!("'nodes' must be in 1..=100, got {nodes}")));
            }
            nodes as u32
        }
        Some(_) => return Err(RunError::InvalidSpec("'nodes' must be an integer".to_string())),
    };

    let ntasks = optional_u32(&value, "ntasks")?;
    let cpus_per_task = optional_u32(&value, "cpus_per_task")?;

    let account = match value.get("account") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(RunError::InvalidSpec("'account' must be a string".to_string())),
    };

    let additional_options = match value.get("additional_options") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| RunError::InvalidSpec("'additional_options' entries must be strings".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(RunError::InvalidSpec(
                "'additional_options' must be a list of strings".to_string(),
            ))
        }
    };

    let spec = BackendSpec::from_value(&value)?;
    Ok(Box::new(SlurmBackend {
        spec,
        queue,
        time_limit,
        nodes,
        ntasks,
        cpus_per_task,
        account,
        additional_options,
        command,
    }))
}

fn optional_u32(value: &Value, field: &'static str) -> Result<Option<u32>, RunError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(n as u32))
            .ok_or_else(|| RunError::InvalidSpec(format!("'{field}' must be a positive integer"))),
        Some(_) => Err(RunError::InvalidSpec(format!("'{field}' must be an integer"))),
    }
}

fn time_limit_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^\d{1,3}:\d{2}:\d{2}$").expect("static regex is valid"))
}

#[async_trait]
impl RunBackend for SlurmBackend {
    fn backend_type(&self) -> &str {
        "slurm"
    }

    async fn launch(&self, run: &ModelRun, run_dir: &Path, cancel: &CancellationToken) -> RunOutcome {
        let started = Instant::now();

        let job_id = match self.submit(run, run_dir).await {
            Ok(id) => id,
            Err(log) => {
                return RunOutcome {
                    state: RunState::Failed { exit_code: None },
                    log_tail: log,
                    duration: started.elapsed(),
                }
            }
        };

        let state = tokio::select! {
            state = self.poll_until_done(&job_id) => state,
            _ = cancel.cancelled() => {
                self.cancel_job(&job_id).await;
                RunState::Cancelled
            }
            _ = super::sleep_until_timeout(self.spec.timeout) => {
                self.cancel_job(&job_id).await;
                RunState::TimedOut
            }
        };

        RunOutcome {
            state,
            log_tail: format!("slurm job {job_id}"),
            duration: started.elapsed(),
        }
    }
}

impl SlurmBackend {
    /// Render the `#SBATCH` submission script from this backend's config
    /// and write it into `run_dir` so the job's working directory already
    /// holds it for inspection.
    fn render_script(&self, run: &ModelRun, run_dir: &Path) -> String {
        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&format!("#SBATCH --partition={}\n", self.queue));
        script.push_str(&format!("#SBATCH --time={}\n", self.time_limit));
        script.push_str(&format!("#SBATCH --nodes={}\n", self.nodes));
        if let Some(ntasks) = self.ntasks {
            script.push_str(&format!("#SBATCH --ntasks={ntasks}\n"));
        }
        if let Some(cpus_per_task) = self.cpus_per_task {
            script.push_str(&format!("#SBATCH --cpus-per-task={cpus_per_task}\n"));
        }
        if let Some(account) = &self.account {
            script.push_str(&format!("#SBATCH --account={account}\n"));
        }
        script.push_str(&format!("#SBATCH --chdir={}\n", run_dir.display()));
        for option in &self.additional_options {
            script.push_str(&format!("#SBATCH {option}\n"));
        }
        script.push_str(&format!("export TIDEPOOL_RUN_ID={}\n", run.run_id));
        script.push_str(&format!("export TIDEPOOL_OUTPUT_DIR={}\n", run_dir.display()));
        for (key, value) in &self.spec.env_vars {
            script.push_str(&format!("export {key}={value}\n"));
        }
        if let Some(working_dir) = &self.spec.working_dir {
            script.push_str(&format!("cd {}\n", working_dir.display()));
        }
        script.push_str(&self.command);
        script.push('\n');
        script
    }

    async fn submit(&self, run: &ModelRun, run_dir: &Path) -> Result<String, String> {
        let script_path = run_dir.join(SUBMIT_SCRIPT_NAME);
        std::fs::write(&script_path, self.render_script(run, run_dir))
            .map_err(|e| format!("failed to write submission script: {e}"))?;

        let output = Command::new("sbatch")
            .arg("--parsable")
            .arg(&script_path)
            .output()
            .await
            .map_err(|e| format!("failed to spawn sbatch: {e}"))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }

        let job_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if job_id.is_empty() {
            return Err("sbatch returned an empty job id".to_string());
        }
        Ok(job_id)
    }

    async fn poll_until_done(&self, job_id: &str) -> RunState {
        loop {
            match Command::new("squeue")
                .args(["-h", "-j", job_id, "-o", "%T"])
                .output()
                .await
            {
                Ok(output) if output.status.success() => {
                    let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if state.is_empty() {
                        // No longer in the queue: check its final accounting state.
                        return self.final_state(job_id).await;
                    }
                }
                _ => return RunState::Failed { exit_code: None },
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn final_state(&self, job_id: &str) -> RunState {
        let output = Command::new("sacct")
            .args(["-j", job_id, "-n", "-X", "-o", "State,ExitCode"])
            .output()
            .await;

        let Ok(output) = output else {
            return RunState::Failed { exit_code: None };
        };
        let text = String::from_utf8_lossy(&output.stdout);
        let line = text.trim();
        if line.starts_with("COMPLETED") {
            return RunState::Succeeded;
        }
        if line.starts_with("CANCELLED") {
            return RunState::Cancelled;
        }
        if line.starts_with("TIMEOUT") {
            return RunState::TimedOut;
        }

        let exit_code = line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.split(':').next())
            .and_then(|code| code.parse::<i32>().ok());
        RunState::Failed { exit_code }
    }

    async fn cancel_job(&self, job_id: &str) {
        let _ = Command::new("scancel").arg(job_id).output().await;
    }
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
