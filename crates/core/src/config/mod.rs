// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config Resolver: turns a template-expanded config document into a
//! typed, validated `ModelRun`.

pub(crate) mod noop;

pub use noop::NoopModelConfig;

use crate::container::ModelRun;
use crate::generate::GenerateError;
use crate::registry::{PluginKind, PluginRegistry};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is missing discriminator field '{field}'")]
    MissingDiscriminator { field: &'static str },

    #[error("unknown {field} '{name}' (available: [{}])", available.join(", "))]
    UnknownVariant {
        field: &'static str,
        name: String,
        available: Vec<String>,
    },

    #[error("invariant violated on '{field}': {reason}")]
    InvariantViolated { field: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(String),
}

/// A parsed, validated model configuration variant. Implementors are
/// produced by a `ConfigFactory` looked up in the registry by
/// `model_type`, then owned immutably by exactly one `ModelRun`.
pub trait ModelConfig: Send + Sync + std::fmt::Debug {
    /// The discriminator this variant was registered under.
    fn model_type(&self) -> &str;

    /// Write every input file this model needs into `run_dir`. Generate
    /// owns directory creation/clearing; this owns content.
    fn materialize(&self, run: &ModelRun, run_dir: &Path) -> Result<(), GenerateError>;

    /// Marker files/subpaths (relative to the staging directory) a
    /// `validate_stages` check should find after Generate. Empty by
    /// default: only "the directory is non-empty" is checked.
    fn expected_markers(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Factory for a registered config variant: raw `config` subtree in,
/// validated `ModelConfig` out.
pub type ConfigFactory = fn(Value) -> Result<Box<dyn ModelConfig>, ConfigError>;

/// Where a config document comes from: a file, or an environment
/// variable holding the whole payload.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    EnvVar(String),
}

impl ConfigSource {
    /// Read and parse the document (YAML or JSON) into the canonical
    /// `serde_json::Value` tree, before any template expansion.
    pub fn load(&self) -> Result<Value, ConfigError> {
        match self {
            ConfigSource::File(path) => {
                let content = std::fs::read_to_string(path)?;
                parse_document(&content, path.extension().and_then(|e| e.to_str()))
            }
            ConfigSource::EnvVar(name) => {
                let content = std::env::var(name).map_err(|_| ConfigError::InvariantViolated {
                    field: name.clone(),
                    reason: "environment variable not set".to_string(),
                })?;
                parse_document(&content, None)
            }
        }
    }
}

fn parse_document(content: &str, extension: Option<&str>) -> Result<Value, ConfigError> {
    let looks_like_json = matches!(extension, Some("json"))
        || content.trim_start().starts_with('{')
        || content.trim_start().starts_with('[');

    if looks_like_json {
        return serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()));
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Raw shape of the `period` subtree, deserialized straight off the
/// (already template-expanded) document.
#[derive(Debug, Clone, Deserialize)]
struct RawPeriod {
    start: String,
    end: Option<String>,
    #[serde(default, with = "humantime_serde::option")]
    duration: Option<Duration>,
    #[serde(with = "humantime_serde")]
    interval: Duration,
}

/// A resolved, validated run period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
    pub interval: Duration,
}

impl TimeRange {
    fn from_raw(raw: RawPeriod) -> Result<Self, ConfigError> {
        let start = parse_iso8601(&raw.start).ok_or_else(|| ConfigError::InvariantViolated {
            field: "period.start".to_string(),
            reason: format!("'{}' is not a valid ISO-8601 datetime", raw.start),
        })?;

        if raw.interval.is_zero() {
            return Err(ConfigError::InvariantViolated {
                field: "period.interval".to_string(),
                reason: "interval must be > 0".to_string(),
            });
        }

        let end = match (&raw.end, raw.duration) {
            (Some(end), _) => parse_iso8601(end).ok_or_else(|| ConfigError::InvariantViolated {
                field: "period.end".to_string(),
                reason: format!("'{end}' is not a valid ISO-8601 datetime"),
            })?,
            (None, Some(duration)) => {
                if duration.is_zero() {
                    return Err(ConfigError::InvariantViolated {
                        field: "period.duration".to_string(),
                        reason: "duration must be > 0".to_string(),
                    });
                }
                start
                    + chrono::Duration::from_std(duration).map_err(|e| {
                        ConfigError::InvariantViolated {
                            field: "period.duration".to_string(),
                            reason: e.to_string(),
                        }
                    })?
            }
            (None, None) => {
                return Err(ConfigError::InvariantViolated {
                    field: "period".to_string(),
                    reason: "one of 'end' or 'duration' is required".to_string(),
                })
            }
        };

        if end <= start {
            return Err(ConfigError::InvariantViolated {
                field: "period".to_string(),
                reason: "end must be after start".to_string(),
            });
        }

        // Clamp `end` up to the next interval boundary so the run always
        // spans a whole number of intervals.
        let span = end - start;
        let interval_chrono =
            chrono::Duration::from_std(raw.interval).map_err(|e| ConfigError::InvariantViolated {
                field: "period.interval".to_string(),
                reason: e.to_string(),
            })?;
        let interval_secs = interval_chrono.num_seconds().max(1);
        let remainder = span.num_seconds().rem_euclid(interval_secs);
        let end = if remainder == 0 {
            end
        } else {
            end + chrono::Duration::seconds(interval_secs - remainder)
        };

        Ok(TimeRange {
            start,
            end,
            interval: raw.interval,
        })
    }
}

fn parse_iso8601(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Raw shape of the whole top-level document.
#[derive(Debug, Clone, Deserialize)]
struct RawDocument {
    run_id: String,
    period: RawPeriod,
    output_dir: PathBuf,
    #[serde(default)]
    delete_existing: bool,
    config: Value,
}

/// Resolve a template-expanded config document into a typed `ModelRun`,
/// per the Config Resolver's four-step algorithm: read the run envelope,
/// require a `model_type` discriminator on the `config` subtree, look the
/// variant up in the registry, then delegate parsing to its factory.
pub fn resolve(document: Value, registry: &PluginRegistry) -> Result<ModelRun, ConfigError> {
    let raw: RawDocument =
        serde_json::from_value(document).map_err(|e| ConfigError::Parse(e.to_string()))?;

    if raw.run_id.is_empty()
        || raw.run_id.contains('/')
        || raw.run_id.contains(std::path::MAIN_SEPARATOR)
        || raw.run_id == "."
        || raw.run_id == ".."
    {
        return Err(ConfigError::InvariantViolated {
            field: "run_id".to_string(),
            reason: "must be a non-empty, filesystem-safe name".to_string(),
        });
    }

    let period = TimeRange::from_raw(raw.period)?;

    let model_type = raw
        .config
        .get("model_type")
        .and_then(Value::as_str)
        .ok_or(ConfigError::MissingDiscriminator {
            field: "model_type",
        })?
        .to_string();

    let factory = registry
        .lookup::<ConfigFactory>(PluginKind::Config, &model_type)
        .map_err(|_| ConfigError::UnknownVariant {
            field: "model_type",
            name: model_type.clone(),
            available: registry.names(PluginKind::Config),
        })?;

    let config = (*factory)(raw.config)?;

    Ok(ModelRun::new(
        raw.run_id,
        period,
        raw.output_dir,
        config,
        raw.delete_existing,
    ))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
