//! Mock backend: deterministic simulated generation with cost accounting.
//!
//! Runs without any external service. Units are estimated at four bytes per
//! unit of the serialized input and output; cost is a flat per-action rate.

use super::{BackendAdapter, BackendError, BackendResponse, BackendUsage};
use crate::core::types::{AtomicAction, Parameters};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const DEFAULT_COST_PER_ACTION: f64 = 0.01;

#[derive(Debug)]
pub struct MockBackend {
    name: String,
    latency: Duration,
    cost_per_action: f64,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Duration::ZERO,
            cost_per_action: DEFAULT_COST_PER_ACTION,
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_cost(mut self, cost_per_action: f64) -> Self {
        self.cost_per_action = cost_per_action;
        self
    }

    /// Make every call for `action_id` fail.
    pub fn failing_on(mut self, action_id: impl Into<String>) -> Self {
        self.failing.insert(action_id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of `execute` calls so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn estimate_units(value: &impl serde::Serialize) -> u64 {
    serde_json::to_string(value)
        .map(|s| (s.len() / 4) as u64)
        .unwrap_or(0)
}

#[async_trait]
impl BackendAdapter for MockBackend {
    async fn execute(
        &self,
        action: &AtomicAction,
        parameters: &Parameters,
    ) -> Result<BackendResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.contains(&action.action_id) {
            return Err(BackendError::Failed(format!(
                "{}: simulated failure for '{}'",
                self.name, action.action_id
            )));
        }

        let goal = parameters
            .get("goal")
            .and_then(Value::as_str)
            .unwrap_or("unspecified");
        let inputs = parameters
            .get("_dependencies")
            .and_then(Value::as_object)
            .map_or(0, |deps| deps.len());
        let output = json!({
            "artifact": format!("[simulated {}] {}", action.action_type, goal),
            "action_type": action.action_type,
            "inputs": inputs,
        });

        let usage = BackendUsage::new(
            self.name.clone(),
            estimate_units(parameters),
            estimate_units(&output),
            self.cost_per_action,
        );
        Ok(BackendResponse { output, usage })
    }
}
