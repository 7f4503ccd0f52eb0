//! Error taxonomy for compile, validate, configure and execute.
//!
//! Plan-level errors (compilation, validation, configuration) abort a run
//! before any backend is called. Action-level errors are contained by the
//! scheduler and only ever surface as FAIL events in the trace.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum WeftError {
    /// Malformed intent. Reserved; the compiler accepts every well-formed intent.
    #[error("compilation error: {0}")]
    Compilation(String),

    /// Dangling dependency, duplicate action id, or dependency cycle.
    #[error("invalid plan: {0}")]
    PlanValidation(String),

    /// A single backend call failed after exhausting its retries.
    #[error("action '{action_id}' failed: {message}")]
    ActionExecution { action_id: String, message: String },

    /// No backend registered, unknown strict backend hint, or bad runtime config.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

pub type Result<T> = std::result::Result<T, WeftError>;

impl WeftError {
    /// True for errors that abort a whole run rather than a single action.
    ///
    /// `Scheduler::run` only returns fatal errors; `ActionExecution` values
    /// come from `ExecutionTrace::failures`.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ActionExecution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_plan_validation() {
        let e = WeftError::PlanValidation("dependency cycle detected involving: a, b".into());
        assert_eq!(
            e.to_string(),
            "invalid plan: dependency cycle detected involving: a, b"
        );
    }

    #[test]
    fn test_error_display_action_execution() {
        let e = WeftError::ActionExecution {
            action_id: "action_0".into(),
            message: "boom".into(),
        };
        assert_eq!(e.to_string(), "action 'action_0' failed: boom");
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_error_fatality() {
        assert!(WeftError::Configuration("no backends".into()).is_fatal());
        assert!(WeftError::Compilation("empty".into()).is_fatal());
        assert!(WeftError::PlanValidation("cycle".into()).is_fatal());
    }

    #[test]
    fn test_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: WeftError = err.into();
        assert!(e.to_string().starts_with("JSON error"));
    }
}
