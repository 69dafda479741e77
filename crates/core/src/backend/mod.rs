// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run Backend: executes a materialized `ModelRun` somewhere (in-process,
//! inside a container, or on a cluster scheduler) and reports back a
//! `RunOutcome`. Backends never raise exceptions across this boundary:
//! every failure mode, including a backend-internal bug, is folded into
//! `RunState::Failed` rather than propagated as a `Result::Err`.

pub(crate) mod docker;
pub(crate) mod local;
pub(crate) mod slurm;

pub use docker::DockerBackend;
pub use local::LocalBackend;
pub use slurm::SlurmBackend;

use crate::cancel::CancellationToken;
use crate::container::ModelRun;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// `timeout_seconds` must fall in this range; spec.md's boundary tests
/// exercise both ends.
const TIMEOUT_SECONDS_RANGE: std::ops::RangeInclusive<u64> = 60..=86400;

/// Errors that can occur while *constructing* a backend from its config
/// subtree. These happen before a run ever starts, so they are ordinary
/// `Result` errors rather than folded into `RunOutcome`.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid backend spec: {0}")]
    InvalidSpec(String),

    #[error("{0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fields every backend variant shares: how long a run may execute before
/// being treated as timed out, how long a terminated process gets to exit
/// on its own before being forced, environment variables injected into
/// the run, and an optional working directory override.
#[derive(Debug, Clone)]
pub struct BackendSpec {
    pub timeout: Option<Duration>,
    pub grace_period: Duration,
    pub env_vars: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for BackendSpec {
    fn default() -> Self {
        Self {
            timeout: None,
            grace_period: Duration::from_secs(5),
            env_vars: BTreeMap::new(),
            working_dir: None,
        }
    }
}

impl BackendSpec {
    fn from_value(value: &Value) -> Result<Self, RunError> {
        let timeout = match value.get("timeout_seconds") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                let duration =
                    humantime::parse_duration(s).map_err(|e| RunError::InvalidSpec(e.to_string()))?;
                Some(validate_timeout(duration)?)
            }
            Some(Value::Number(n)) => {
                let seconds = n
                    .as_u64()
                    .ok_or_else(|| RunError::InvalidSpec("'timeout_seconds' must be a positive integer".to_string()))?;
                Some(validate_timeout(Duration::from_secs(seconds))?)
            }
            Some(_) => {
                return Err(RunError::InvalidSpec(
                    "'timeout_seconds' must be a duration string or a number of seconds".to_string(),
                ))
            }
        };
        let grace_period = match value.get("grace_period") {
            None | Some(Value::Null) => Duration::from_secs(5),
            Some(Value::String(s)) => {
                humantime::parse_duration(s).map_err(|e| RunError::InvalidSpec(e.to_string()))?
            }
            Some(_) => {
                return Err(RunError::InvalidSpec(
                    "'grace_period' must be a duration string".to_string(),
                ))
            }
        };
        let env_vars = match value.get("env_vars") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(map)) => {
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    let v = v
                        .as_str()
                        .ok_or_else(|| RunError::InvalidSpec(format!("'env_vars.{k}' must be a string")))?;
                    out.insert(k.clone(), v.to_string());
                }
                out
            }
            Some(_) => return Err(RunError::InvalidSpec("'env_vars' must be a string-to-string map".to_string())),
        };
        let working_dir = match value.get("working_dir") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                let path = PathBuf::from(s);
                if !path.is_dir() {
                    return Err(RunError::InvalidSpec(format!(
                        "'working_dir' {path:?} does not exist"
                    )));
                }
                Some(path)
            }
            Some(_) => return Err(RunError::InvalidSpec("'working_dir' must be a path string".to_string())),
        };
        Ok(Self {
            timeout,
            grace_period,
            env_vars,
            working_dir,
        })
    }
}

fn validate_timeout(duration: Duration) -> Result<Duration, RunError> {
    let seconds = duration.as_secs();
    if !TIMEOUT_SECONDS_RANGE.contains(&seconds) {
        return Err(RunError::InvalidSpec(format!(
            "'timeout_seconds' must be in {}..={}, got {seconds}",
            TIMEOUT_SECONDS_RANGE.start(),
            TIMEOUT_SECONDS_RANGE.end()
        )));
    }
    Ok(duration)
}

/// The terminal state of one backend invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut,
    Cancelled,
}

/// What a backend reports after `launch` returns, regardless of outcome.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: RunState,
    pub log_tail: String,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.state == RunState::Succeeded
    }
}

/// A backend that executes a run's staged inputs and produces output
/// under `ModelRun::run_dir`.
#[async_trait]
pub trait RunBackend: Send + Sync + std::fmt::Debug {
    /// The discriminator this variant was registered under.
    fn backend_type(&self) -> &str;

    /// Run `run_dir`'s contents to completion (or timeout, or
    /// cancellation), writing output alongside them.
    async fn launch(
        &self,
        run: &ModelRun,
        run_dir: &Path,
        cancel: &CancellationToken,
    ) -> RunOutcome;
}

/// Factory for a registered backend variant: raw `backend` subtree in,
/// constructed `RunBackend` out. Construction-time errors (malformed
/// spec) are ordinary `Result` errors; only post-launch failures are
/// folded into `RunOutcome`.
pub type RunBackendFactory = fn(Value) -> Result<Box<dyn RunBackend>, RunError>;

/// Send SIGTERM, wait up to `grace_period` for the child to exit on its
/// own, then SIGKILL. Shared by every backend that owns a local child
/// process (`local`, `docker`'s `docker run` wrapper).
pub(crate) async fn terminate_gracefully(
    child: &mut tokio::process::Child,
    grace_period: Duration,
) -> std::io::Result<()> {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
        #[cfg(not(unix))]
        {
            let _ = pid;
        }
    }

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(_) => Ok(()),
        Err(_) => {
            child.start_kill()?;
            child.wait().await?;
            Ok(())
        }
    }
}

/// Resolve after `timeout` elapses, or never if there is none.
pub(crate) async fn sleep_until_timeout(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
