//! YAML/JSON parsing and validation of intents, plans and runtime config.
//!
//! JSON documents are valid YAML, so one parser covers both. Validation
//! collects every problem instead of stopping at the first:
//! - Runtime config: worker bound ≥ 1, sane backoff, non-zero timeout
//! - Intent: goals must be non-empty strings
//! - Plan: delegated to `ExecutionPlan::validate_strict`

use super::config::{Backoff, RuntimeConfig};
use super::error::Result;
use super::plan::ExecutionPlan;
use super::types::Intent;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn read(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

pub fn parse_intent(yaml: &str) -> Result<Intent> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

pub fn parse_intent_file(path: &Path) -> Result<Intent> {
    parse_intent(&read(path)?)
}

pub fn parse_plan(yaml: &str) -> Result<ExecutionPlan> {
    Ok(serde_yaml_ng::from_str(yaml)?)
}

pub fn parse_plan_file(path: &Path) -> Result<ExecutionPlan> {
    parse_plan(&read(path)?)
}

/// Parse a runtime config. An empty document yields the defaults.
pub fn parse_config(yaml: &str) -> Result<RuntimeConfig> {
    if yaml.trim().is_empty() {
        return Ok(RuntimeConfig::default());
    }
    Ok(serde_yaml_ng::from_str(yaml)?)
}

pub fn parse_config_file(path: &Path) -> Result<RuntimeConfig> {
    parse_config(&read(path)?)
}

/// Validate a runtime config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &RuntimeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.max_workers == 0 {
        errors.push(ValidationError {
            message: "max_workers must be at least 1".to_string(),
        });
    }

    if let Backoff::Exponential { base_ms, max_ms } = config.retry.backoff {
        if base_ms == 0 {
            errors.push(ValidationError {
                message: "exponential backoff needs base_ms > 0".to_string(),
            });
        }
        if max_ms < base_ms {
            errors.push(ValidationError {
                message: format!(
                    "exponential backoff max_ms ({}) is below base_ms ({})",
                    max_ms, base_ms
                ),
            });
        }
    }

    if config.attempt_timeout_ms == Some(0) {
        errors.push(ValidationError {
            message: "attempt_timeout_ms must be positive when set".to_string(),
        });
    }

    errors
}

/// Validate an intent. Returns a list of errors (empty = valid).
///
/// An intent with no goals is valid: it compiles to an empty plan.
pub fn validate_intent(intent: &Intent) -> Vec<ValidationError> {
    intent
        .goals
        .iter()
        .enumerate()
        .filter(|(_, goal)| goal.trim().is_empty())
        .map(|(i, _)| ValidationError {
            message: format!("goal {} is empty", i),
        })
        .collect()
}
