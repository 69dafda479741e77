// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `${VAR}` / `${VAR:-default}` / `${VAR|filter[:arg]|...}` template
//! expansion over a parsed config document, run before any schema
//! validation (see `config::resolve`).
//!
//! The grammar is shell-style, not Jinja2: it is grounded on the
//! `${VAR}` / `${VAR:-default}` environment-substitution parser found in
//! the wider example pack (a YAML config loader's `expand_env_vars`),
//! extended here with the filter chain and typed-scalar rules this crate
//! needs (`as_datetime`, `strftime:<fmt>`, `shift:[+|-]<n><unit>`).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("undefined variable: {0}")]
    Undefined(String),

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("could not parse '{0}' as an ISO-8601 datetime")]
    BadDatetime(String),

    #[error("filter '{filter}' expects a datetime value, got {got}")]
    TypeMismatch { filter: String, got: &'static str },

    #[error("unterminated template expression: '${{{0}'")]
    Unterminated(String),
}

/// Variable bindings available to `${...}` expressions. Typically built
/// from the process environment via [`Context::from_env`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    vars: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment.
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// The engine. Stateless; all inputs come from the document and the
/// `Context` passed to `expand_document`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite every string scalar in `doc`, depth-first, before any
    /// schema validation inspects it.
    pub fn expand_document(&self, doc: Value, ctx: &Context) -> Result<Value, TemplateError> {
        match doc {
            Value::String(s) => expand_scalar(&s, ctx),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.expand_document(item, ctx)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, self.expand_document(v, ctx)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        }
    }

    /// Expand a single scalar string in isolation (used by the CLI's
    /// `backends validate` path, which validates a backend config file
    /// that was never embedded in a larger document).
    pub fn expand_str(&self, input: &str, ctx: &Context) -> Result<Value, TemplateError> {
        expand_scalar(input, ctx)
    }
}

/// One parsed `${...}` expression: a variable name, an optional literal
/// default, and a left-to-right filter chain.
#[derive(Debug, Clone)]
struct Expression {
    name: String,
    default: Option<String>,
    filters: Vec<FilterCall>,
}

#[derive(Debug, Clone)]
struct FilterCall {
    name: String,
    arg: Option<String>,
}

enum Segment {
    Literal(String),
    Expr(Expression),
}

/// A typed value produced by resolving one `${...}` expression.
#[derive(Debug, Clone, PartialEq)]
enum TemplateValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl TemplateValue {
    fn type_name(&self) -> &'static str {
        match self {
            TemplateValue::Str(_) => "string",
            TemplateValue::Int(_) => "int",
            TemplateValue::Float(_) => "float",
            TemplateValue::Bool(_) => "bool",
            TemplateValue::DateTime(_) => "datetime",
        }
    }

    fn display(&self) -> String {
        match self {
            TemplateValue::Str(s) => s.clone(),
            TemplateValue::Int(n) => n.to_string(),
            TemplateValue::Float(f) => f.to_string(),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::DateTime(dt) => dt.to_rfc3339(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            TemplateValue::Str(s) => Value::String(s.clone()),
            TemplateValue::Int(n) => Value::from(*n),
            TemplateValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(f.to_string())),
            TemplateValue::Bool(b) => Value::Bool(*b),
            TemplateValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
        }
    }

    /// A bare `${NAME}` scalar with no filters infers int/float/bool/string
    /// from the raw variable text, per spec's scalar type-inheritance rule.
    fn infer_from_str(raw: &str) -> TemplateValue {
        if let Ok(n) = raw.parse::<i64>() {
            return TemplateValue::Int(n);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return TemplateValue::Float(f);
        }
        match raw {
            "true" => TemplateValue::Bool(true),
            "false" => TemplateValue::Bool(false),
            _ => TemplateValue::Str(raw.to_string()),
        }
    }
}

fn expand_scalar(input: &str, ctx: &Context) -> Result<Value, TemplateError> {
    let segments = parse_segments(input)?;

    if let [Segment::Expr(expr)] = segments.as_slice() {
        // Exactly one template expression: the scalar inherits its type.
        return Ok(eval(expr, ctx)?.to_json());
    }

    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(s) => out.push_str(&s),
            Segment::Expr(expr) => out.push_str(&eval(&expr, ctx)?.display()),
        }
    }
    Ok(Value::String(out))
}

fn parse_segments(input: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut depth = 1;
            let mut raw = String::new();
            loop {
                match chars.next() {
                    Some('{') => {
                        depth += 1;
                        raw.push('{');
                    }
                    Some('}') => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                        raw.push('}');
                    }
                    Some(other) => raw.push(other),
                    None => return Err(TemplateError::Unterminated(raw)),
                }
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Expr(parse_expression(&raw)));
        } else {
            literal.push(c);
        }
    }

    if !literal.is_empty() || segments.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

fn parse_expression(raw: &str) -> Expression {
    let mut parts = raw.split('|');
    let head = parts.next().unwrap_or_default();

    let (name, default) = match head.split_once(":-") {
        Some((name, default)) => (name.trim().to_string(), Some(default.to_string())),
        None => (head.trim().to_string(), None),
    };

    let filters = parts
        .map(|f| match f.split_once(':') {
            Some((name, arg)) => FilterCall {
                name: name.trim().to_string(),
                arg: Some(arg.trim().to_string()),
            },
            None => FilterCall {
                name: f.trim().to_string(),
                arg: None,
            },
        })
        .collect();

    Expression {
        name,
        default,
        filters,
    }
}

fn eval(expr: &Expression, ctx: &Context) -> Result<TemplateValue, TemplateError> {
    let mut value = match ctx.get(&expr.name) {
        Some(raw) => {
            if expr.filters.is_empty() {
                TemplateValue::infer_from_str(raw)
            } else {
                TemplateValue::Str(raw.to_string())
            }
        }
        None => match &expr.default {
            // Defaults are used literally: no further expansion or inference.
            Some(default) => return Ok(TemplateValue::Str(default.clone())),
            None => return Err(TemplateError::Undefined(expr.name.clone())),
        },
    };

    for filter in &expr.filters {
        value = apply_filter(filter, value)?;
    }

    Ok(value)
}

fn apply_filter(filter: &FilterCall, value: TemplateValue) -> Result<TemplateValue, TemplateError> {
    match filter.name.as_str() {
        "as_datetime" => {
            let raw = match &value {
                TemplateValue::Str(s) => s.as_str(),
                other => {
                    return Err(TemplateError::TypeMismatch {
                        filter: filter.name.clone(),
                        got: other.type_name(),
                    })
                }
            };
            parse_datetime(raw)
                .map(TemplateValue::DateTime)
                .ok_or_else(|| TemplateError::BadDatetime(raw.to_string()))
        }
        "strftime" => {
            let dt = expect_datetime(&filter.name, &value)?;
            let fmt = filter.arg.as_deref().unwrap_or("%Y-%m-%d");
            Ok(TemplateValue::Str(dt.format(fmt).to_string()))
        }
        "shift" => {
            let dt = expect_datetime(&filter.name, &value)?;
            let arg = filter.arg.as_deref().unwrap_or("+0s");
            let delta = parse_shift(arg).ok_or_else(|| TemplateError::BadDatetime(arg.to_string()))?;
            Ok(TemplateValue::DateTime(dt + delta))
        }
        other => Err(TemplateError::UnknownFilter(other.to_string())),
    }
}

/// `strftime` and `shift` both operate on a datetime. A bare string is
/// treated as if `as_datetime` had run first rather than rejected
/// outright; a string that fails to parse as a datetime is a
/// `BadDatetime`, not a `TypeMismatch` — the latter is reserved for
/// values that could never be a datetime no matter how they're spelled
/// (int, float, bool).
fn expect_datetime(filter_name: &str, value: &TemplateValue) -> Result<DateTime<Utc>, TemplateError> {
    match value {
        TemplateValue::DateTime(dt) => Ok(*dt),
        TemplateValue::Str(s) => {
            parse_datetime(s).ok_or_else(|| TemplateError::BadDatetime(s.clone()))
        }
        other => Err(TemplateError::TypeMismatch {
            filter: filter_name.to_string(),
            got: other.type_name(),
        }),
    }
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Accept a bare naive timestamp ("2023-01-15T00:00:00") as UTC.
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse `[+|-]<n><unit>` where unit is one of d/h/m/s.
fn parse_shift(raw: &str) -> Option<ChronoDuration> {
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let unit = rest.chars().last()?;
    let digits = &rest[..rest.len() - unit.len_utf8()];
    let n: i64 = digits.parse().ok()?;
    let n = n * sign;

    Some(match unit {
        'd' => ChronoDuration::days(n),
        'h' => ChronoDuration::hours(n),
        'm' => ChronoDuration::minutes(n),
        's' => ChronoDuration::seconds(n),
        _ => return None,
    })
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
