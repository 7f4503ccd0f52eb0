//! Backend adapters: the pluggable executors behind the scheduler.
//!
//! A backend performs one atomic action and reports its output and resource
//! usage. Backends are registered by name on a [`BackendRegistry`];
//! selection is by the action's hint when registered, otherwise the first
//! backend registered.

pub mod local;
pub mod mock;

use crate::core::types::{AtomicAction, Parameters};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use local::LocalBackend;
pub use mock::MockBackend;

/// Resource usage of one backend call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendUsage {
    pub prompt_units: u64,
    pub completion_units: u64,
    pub total_units: u64,
    pub cost: f64,
    pub backend_name: String,
}

impl BackendUsage {
    pub fn new(
        backend_name: impl Into<String>,
        prompt_units: u64,
        completion_units: u64,
        cost: f64,
    ) -> Self {
        Self {
            prompt_units,
            completion_units,
            total_units: prompt_units + completion_units,
            cost,
            backend_name: backend_name.into(),
        }
    }
}

/// Output of a successful backend call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub output: Value,
    pub usage: BackendUsage,
}

/// A failed backend call. Every variant counts as one failed attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{0}")]
    Failed(String),

    #[error("attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Executes one atomic action.
///
/// `parameters` are the action's parameters after dependency injection;
/// adapters should read them instead of `action.parameters`.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    async fn execute(
        &self,
        action: &AtomicAction,
        parameters: &Parameters,
    ) -> Result<BackendResponse, BackendError>;
}

/// Named backends in registration order.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: IndexMap<String, Arc<dyn BackendAdapter>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend. Re-registering a name replaces the adapter but
    /// keeps its original position.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn BackendAdapter>) {
        self.backends.insert(name.into(), backend);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Pick the backend for an action: the hinted one when registered,
    /// otherwise the first registered. `None` only when the registry is empty.
    pub fn select(&self, hint: Option<&str>) -> Option<(&str, &Arc<dyn BackendAdapter>)> {
        if let Some(hint) = hint {
            if let Some((name, backend)) = self.backends.get_key_value(hint) {
                return Some((name.as_str(), backend));
            }
            tracing::warn!(hint, "backend hint not registered, using first registered backend");
        }
        self.backends
            .first()
            .map(|(name, backend)| (name.as_str(), backend))
    }
}
