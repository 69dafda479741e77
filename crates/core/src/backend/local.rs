// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `local` backend: runs a run's command in-process via the shell,
//! with the run directory as its working directory unless overridden by
//! `working_dir`.

use super::{sleep_until_timeout, terminate_gracefully, BackendSpec, RunBackend, RunError, RunOutcome, RunState};
use crate::cancel::CancellationToken;
use crate::container::ModelRun;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const LOG_TAIL_LINES: usize = 200;

#[derive(Debug, Clone)]
pub struct LocalBackend {
    spec: BackendSpec,
    command: String,
}

impl LocalBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            spec: BackendSpec::default(),
            command: command.into(),
        }
    }

    pub fn with_spec(mut self, spec: BackendSpec) -> Self {
        self.spec = spec;
        self
    }
}

pub fn factory(value: Value) -> Result<Box<dyn RunBackend>, RunError> {
    let command = value
        .get("command")
        .and_then(Value::as_str)
        .ok_or_else(|| RunError::InvalidSpec("'command' is required for the local backend".to_string()))?
        .to_string();
    let spec = BackendSpec::from_value(&value)?;
    Ok(Box::new(LocalBackend { spec, command }))
}

#[async_trait]
impl RunBackend for LocalBackend {
    fn backend_type(&self) -> &str {
        "local"
    }

    async fn launch(&self, run: &ModelRun, run_dir: &Path, cancel: &CancellationToken) -> RunOutcome {
        let started = Instant::now();

        let cwd = self.spec.working_dir.as_deref().unwrap_or(run_dir);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .current_dir(cwd)
            .env("TIDEPOOL_RUN_ID", &run.run_id)
            .env("TIDEPOOL_OUTPUT_DIR", run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.spec.env_vars {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome {
                    state: RunState::Failed { exit_code: None },
                    log_tail: format!("failed to spawn: {e}"),
                    duration: started.elapsed(),
                }
            }
        };

        let tail: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        spawn_tail_reader(child.stdout.take(), Arc::clone(&tail));
        spawn_tail_reader(child.stderr.take(), Arc::clone(&tail));

        let state = tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if status.success() => RunState::Succeeded,
                    Ok(status) => RunState::Failed { exit_code: status.code() },
                    Err(_) => RunState::Failed { exit_code: None },
                }
            }
            _ = cancel.cancelled() => {
                let _ = terminate_gracefully(&mut child, self.spec.grace_period).await;
                RunState::Cancelled
            }
            _ = sleep_until_timeout(self.spec.timeout) => {
                let _ = terminate_gracefully(&mut child, self.spec.grace_period).await;
                RunState::TimedOut
            }
        };

        RunOutcome {
            state,
            log_tail: tail.lock().unwrap_or_else(|e| e.into_inner()).join("\n"),
            duration: started.elapsed(),
        }
    }
}

fn spawn_tail_reader<R>(reader: Option<R>, tail: Arc<Mutex<Vec<String>>>)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else { return };
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let mut buf = tail.lock().unwrap_or_else(|e| e.into_inner());
            buf.push(line);
            if buf.len() > LOG_TAIL_LINES {
                let overflow = buf.len() - LOG_TAIL_LINES;
                buf.drain(0..overflow);
            }
        }
    });
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
