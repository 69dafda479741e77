// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `docker` backend: runs a run's image (or a dockerfile built on the
//! fly) via the `docker` CLI, mounting the run directory read-write and
//! any configured volumes. Only one `docker run` is ever in flight at a
//! time across the whole process: GPU-bound model images are assumed to
//! contend for the host's accelerator, so a second run waits rather than
//! racing.

use super::{terminate_gracefully, BackendSpec, RunBackend, RunError, RunOutcome, RunState};
use crate::cancel::CancellationToken;
use crate::config::ConfigError;
use crate::container::ModelRun;
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Instant;
use tokio::process::Command;
use tokio::sync::Semaphore;

/// Process-wide exclusivity gate: exactly one `docker run` runs at a
/// time, regardless of how many `DockerBackend` instances are built.
fn exclusivity_gate() -> &'static Semaphore {
    static GATE: OnceLock<Semaphore> = OnceLock::new();
    GATE.get_or_init(|| Semaphore::new(1))
}

#[derive(Debug, Clone)]
pub struct Volume {
    host: PathBuf,
    container: String,
    mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DockerBackend {
    spec: BackendSpec,
    image: Option<String>,
    dockerfile: Option<PathBuf>,
    build_args: Vec<(String, String)>,
    cpu: Option<u32>,
    memory: Option<String>,
    volumes: Vec<Volume>,
    user: Option<String>,
    executable: Option<String>,
    mpiexec: Option<String>,
    remove_container: bool,
}

impl DockerBackend {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            spec: BackendSpec::default(),
            image: Some(image.into()),
            dockerfile: None,
            build_args: Vec::new(),
            cpu: None,
            memory: None,
            volumes: Vec::new(),
            user: None,
            executable: None,
            mpiexec: None,
            remove_container: true,
        }
    }

    pub fn with_spec(mut self, spec: BackendSpec) -> Self {
        self.spec = spec;
        self
    }
}

pub fn factory(value: Value) -> Result<Box<dyn RunBackend>, RunError> {
    let image = match value.get("image") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(RunError::InvalidSpec("'image' must be a string".to_string())),
    };
    let dockerfile = match value.get("dockerfile") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(PathBuf::from(s)),
        Some(_) => return Err(RunError::InvalidSpec("'dockerfile' must be a string".to_string())),
    };

    match (&image, &dockerfile) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(ConfigError::InvariantViolated {
                field: "image|dockerfile".to_string(),
                reason: "exactly one of 'image' or 'dockerfile' must be set".to_string(),
            }
            .into())
        }
        _ => {}
    }

    let build_args = match value.get("build_args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => {
            let mut out = Vec::with_capacity(map.len());
            for (k, v) in map {
                let v = v
                    .as_str()
                    .ok_or_else(|| RunError::InvalidSpec(format!("'build_args.{k}' must be a string")))?;
                out.push((k.clone(), v.to_string()));
            }
            out
        }
        Some(_) => return Err(RunError::InvalidSpec("'build_args' must be a string-to-string map".to_string())),
    };

    let cpu = match value.get("cpu") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => {
            let cpu = n
                .as_u64()
                .ok_or_else(|| RunError::InvalidSpec("'cpu' must be a positive integer".to_string()))?;
            if !(1..=128).contains(&cpu) {
                return Err(RunError::InvalidSpec(format!("'cpu' must be in 1..=128, got {cpu}")));
            }
            Some(cpu as u32)
        }
        Some(_) => return Err(RunError::InvalidSpec("'cpu' must be an integer".to_string())),
    };

    let memory = match value.get("memory") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => {
            let re = memory_pattern();
            if !re.is_match(s) {
                return Err(RunError::InvalidSpec(format!(
                    "'memory' must match <number>[m|g], got '{s}'"
                )));
            }
            Some(s.clone())
        }
        Some(_) => return Err(RunError::InvalidSpec("'memory' must be a string".to_string())),
    };

    let volumes = match value.get("volumes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let raw = item
                    .as_str()
                    .ok_or_else(|| RunError::InvalidSpec("'volumes' entries must be strings".to_string()))?;
                out.push(parse_volume(raw)?);
            }
            out
        }
        Some(_) => return Err(RunError::InvalidSpec("'volumes' must be a list of strings".to_string())),
    };

    let user = string_field(&value, "user")?;
    let executable = string_field(&value, "executable")?;
    let mpiexec = string_field(&value, "mpiexec")?;

    let remove_container = match value.get("remove_container") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(RunError::InvalidSpec("'remove_container' must be a bool".to_string())),
    };

    let spec = BackendSpec::from_value(&value)?;
    Ok(Box::new(DockerBackend {
        spec,
        image,
        dockerfile,
        build_args,
        cpu,
        memory,
        volumes,
        user,
        executable,
        mpiexec,
        remove_container,
    }))
}

fn string_field(value: &Value, field: &'static str) -> Result<Option<String>, RunError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RunError::InvalidSpec(format!("'{field}' must be a string"))),
    }
}

fn parse_volume(raw: &str) -> Result<Volume, RunError> {
    let mut parts = raw.splitn(3, ':');
    let host = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RunError::InvalidSpec(format!("'{raw}' is not a valid volume spec")))?;
    let container = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RunError::InvalidSpec(format!("'{raw}' is not a valid volume spec")))?;
    let mode = parts.next().map(str::to_string);

    let host = PathBuf::from(host);
    if !host.exists() {
        return Err(RunError::InvalidSpec(format!(
            "volume host path {host:?} does not exist"
        )));
    }

    Ok(Volume {
        host,
        container: container.to_string(),
        mode,
    })
}

fn memory_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^\d+[mg]$").expect("static regex is valid"))
}

#[async_trait]
impl RunBackend for DockerBackend {
    fn backend_type(&self) -> &str {
        "docker"
    }

    async fn launch(&self, run: &ModelRun, run_dir: &Path, cancel: &CancellationToken) -> RunOutcome {
        let started = Instant::now();

        let permit = tokio::select! {
            permit = exclusivity_gate().acquire() => permit,
            _ = cancel.cancelled() => {
                return RunOutcome {
                    state: RunState::Cancelled,
                    log_tail: "cancelled while waiting for the docker exclusivity lock".to_string(),
                    duration: started.elapsed(),
                };
            }
        };
        let Ok(_permit) = permit else {
            return RunOutcome {
                state: RunState::Failed { exit_code: None },
                log_tail: "docker exclusivity semaphore was closed".to_string(),
                duration: started.elapsed(),
            };
        };

        let image = match self.resolve_image().await {
            Ok(image) => image,
            Err(log) => {
                return RunOutcome {
                    state: RunState::Failed { exit_code: None },
                    log_tail: log,
                    duration: started.elapsed(),
                }
            }
        };

        let mut cmd = Command::new("docker");
        cmd.arg("run");
        if self.remove_container {
            cmd.arg("--rm");
        }
        cmd.arg("-v").arg(format!("{}:/workspace:rw", run_dir.display()));
        for volume in &self.volumes {
            let mode = volume.mode.as_deref().unwrap_or("rw");
            cmd.arg("-v")
                .arg(format!("{}:{}:{}", volume.host.display(), volume.container, mode));
        }
        cmd.arg("-e").arg(format!("TIDEPOOL_RUN_ID={}", run.run_id));
        for (key, value) in &self.spec.env_vars {
            cmd.arg("-e").arg(format!("{key}={value}"));
        }

        if let Some(cpu) = self.cpu {
            cmd.arg("--cpus").arg(cpu.to_string());
        }
        if let Some(memory) = &self.memory {
            cmd.arg("--memory").arg(memory);
        }
        if let Some(user) = &self.user {
            cmd.arg("--user").arg(user);
        }
        if let Some(working_dir) = &self.spec.working_dir {
            cmd.arg("-w").arg(working_dir);
        }

        cmd.arg(&image);

        if let Some(executable) = &self.executable {
            match &self.mpiexec {
                Some(mpiexec) => {
                    cmd.args(mpiexec.split_whitespace());
                    cmd.args(executable.split_whitespace());
                }
                None => {
                    cmd.args(executable.split_whitespace());
                }
            }
        }

        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome {
                    state: RunState::Failed { exit_code: None },
                    log_tail: format!("failed to spawn docker: {e}"),
                    duration: started.elapsed(),
                }
            }
        };

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
            _ = super::sleep_until_timeout(self.spec.timeout) => {
                let _ = terminate_gracefully(&mut child, self.spec.grace_period).await;
                RunState::TimedOut
            }
        };

        let log_tail = collect_remaining_output(&mut child).await;

        RunOutcome {
            state,
            log_tail,
            duration: started.elapsed(),
        }
    }
}

impl DockerBackend {
    /// If `image` was set, use it as-is. Otherwise build from `dockerfile`
    /// (context defaults to the dockerfile's parent directory) and return
    /// the freshly built, run-scoped tag.
    async fn resolve_image(&self) -> Result<String, String> {
        if let Some(image) = &self.image {
            return Ok(image.clone());
        }

        let Some(dockerfile) = self.dockerfile.as_ref() else {
            return Err("docker backend has neither 'image' nor 'dockerfile' set".to_string());
        };
        let context = dockerfile.parent().unwrap_or_else(|| Path::new("."));
        let tag = format!("tidepool-build-{}", std::process::id());

        let mut cmd = Command::new("docker");
        cmd.arg("build").arg("-f").arg(dockerfile).arg("-t").arg(&tag);
        for (key, value) in &self.build_args {
            cmd.arg("--build-arg").arg(format!("{key}={value}"));
        }
        cmd.arg(context);

        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to spawn docker build: {e}"))?;
        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        Ok(tag)
    }
}

async fn collect_remaining_output(child: &mut tokio::process::Child) -> String {
    use tokio::io::AsyncReadExt;
    let mut combined = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_string(&mut combined).await;
    }
    if let Some(mut stderr) = child.stderr.take() {
        let mut err = String::new();
        let _ = stderr.read_to_string(&mut err).await;
        combined.push_str(&err);
    }
    combined
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
