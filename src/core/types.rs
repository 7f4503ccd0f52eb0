//! Core value types: intents, atomic actions, action types and statuses.
//!
//! All types derive Serialize/Deserialize so intents and plans can be read
//! from YAML/JSON documents and written back out unchanged.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Order-preserving string-keyed map of arbitrary JSON values.
pub type Parameters = IndexMap<String, Value>;

// ============================================================================
// Intent
// ============================================================================

/// Declarative request: what the caller wants done, not how.
///
/// Consumed by reference by the compiler; nothing in the crate mutates an
/// intent after it is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Ordered goal strings, one action per goal
    pub goals: Vec<String>,

    /// Merged into every compiled action's parameters
    #[serde(default)]
    pub constraints: Parameters,

    /// Free-form caller metadata (not forwarded to backends)
    #[serde(default)]
    pub metadata: Parameters,

    /// Requesting user, if any
    #[serde(default)]
    pub user_id: Option<String>,

    /// Priority tier for callers that queue intents
    #[serde(default)]
    pub priority: i32,
}

impl Intent {
    pub fn new<I, S>(goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            goals: goals.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

// ============================================================================
// Action types
// ============================================================================

/// Closed set of action kinds a backend may be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Generate,
    Transform,
    Filter,
    Compose,
    Export,
}

impl ActionType {
    /// Every variant, in classification precedence order.
    pub const ALL: [ActionType; 5] = [
        Self::Transform,
        Self::Filter,
        Self::Compose,
        Self::Export,
        Self::Generate,
    ];

    /// Keyword that selects this type during goal classification.
    /// `Generate` has none: it is the default branch.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Transform => Some("transform"),
            Self::Filter => Some("filter"),
            Self::Compose => Some("compose"),
            Self::Export => Some("export"),
            Self::Generate => None,
        }
    }

    /// Classify a goal by case-insensitive keyword containment.
    ///
    /// Total and deterministic: the first keyword found in precedence order
    /// wins, and a goal with no keyword is a `Generate`.
    pub fn classify(goal: &str) -> Self {
        let lowered = goal.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.keyword().is_some_and(|kw| lowered.contains(kw)))
            .unwrap_or(Self::Generate)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Transform => write!(f, "transform"),
            Self::Filter => write!(f, "filter"),
            Self::Compose => write!(f, "compose"),
            Self::Export => write!(f, "export"),
        }
    }
}

// ============================================================================
// Action status
// ============================================================================

/// Per-action lifecycle: PENDING → RUNNING → (SUCCESS | FAIL).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionStatus {
    Pending,
    Running,
    Success,
    Fail,
}

impl ActionStatus {
    /// True once the action has settled and will not run again this run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Fail)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

// ============================================================================
// Atomic action
// ============================================================================

/// One schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicAction {
    /// Unique within its plan
    pub action_id: String,

    /// What the backend is asked to do
    pub action_type: ActionType,

    /// Backend input (before dependency injection)
    #[serde(default)]
    pub parameters: Parameters,

    /// Action ids that must settle before this one starts
    #[serde(default)]
    pub dependencies: IndexSet<String>,

    /// Preferred backend name
    #[serde(default)]
    pub backend_hint: Option<String>,
}

impl AtomicAction {
    pub fn new(action_id: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            action_id: action_id.into(),
            action_type,
            parameters: Parameters::new(),
            dependencies: IndexSet::new(),
            backend_hint: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, action_id: impl Into<String>) -> Self {
        self.dependencies.insert(action_id.into());
        self
    }

    pub fn with_backend_hint(mut self, backend: impl Into<String>) -> Self {
        self.backend_hint = Some(backend.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
