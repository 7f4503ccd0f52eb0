//! Execution context: per-run store of settled action results.
//!
//! Workers in parallel mode store and read concurrently, so the map sits
//! behind a single mutex. A result is written at most once per action id;
//! later writes for the same id are rejected, never merged.

use super::types::{ActionStatus, Parameters};
use crate::trace::TraceEvent;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Final outcome of one action within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub action_id: String,
    pub status: ActionStatus,
    pub output: Value,
    pub error: Option<String>,
    pub cost: f64,
    pub metadata: Parameters,
    pub timestamp: String,
}

impl ActionResult {
    pub fn is_successful(&self) -> bool {
        self.status == ActionStatus::Success
    }

    /// Look up a field of an object-shaped output.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.output.get(key)
    }
}

impl From<&TraceEvent> for ActionResult {
    fn from(event: &TraceEvent) -> Self {
        Self {
            action_id: event.action_id.clone(),
            status: event.status,
            output: event.payload.clone(),
            error: event.error_message().map(str::to_string),
            cost: event.cost,
            metadata: event.metadata.clone(),
            timestamp: event.timestamp.clone(),
        }
    }
}

/// Thread-safe map of `action_id → ActionResult` for one run.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    results: Mutex<HashMap<String, ActionResult>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActionResult>> {
        // A panicking writer cannot leave a half-inserted entry behind.
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a settled event. Returns false, keeping the existing result,
    /// if this action already has one.
    pub fn store_result(&self, event: &TraceEvent) -> bool {
        let mut results = self.lock();
        if results.contains_key(&event.action_id) {
            tracing::warn!(
                action_id = %event.action_id,
                "result already stored, ignoring duplicate"
            );
            return false;
        }
        results.insert(event.action_id.clone(), ActionResult::from(event));
        true
    }

    pub fn get_result(&self, action_id: &str) -> Option<ActionResult> {
        self.lock().get(action_id).cloned()
    }

    pub fn has_result(&self, action_id: &str) -> bool {
        self.lock().contains_key(action_id)
    }

    /// Stored results for the given ids, in the order given. Missing ids are skipped.
    pub fn dependency_results<'a, I>(&self, dependency_ids: I) -> Vec<ActionResult>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let results = self.lock();
        dependency_ids
            .into_iter()
            .filter_map(|id| results.get(id).cloned())
            .collect()
    }

    /// Copy `parameters` and add upstream outputs under the well-known keys:
    /// `_dep_<id>`, `_dep_<id>_status`, `_dep_<id>_success`, plus an aggregate
    /// `_dependencies` map. Dependencies without a stored result are omitted.
    pub fn inject_dependencies<'a, I>(
        &self,
        action_id: &str,
        dependency_ids: I,
        parameters: &Parameters,
    ) -> Parameters
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut enriched = parameters.clone();
        let deps = self.dependency_results(dependency_ids);
        if deps.is_empty() {
            return enriched;
        }

        let mut aggregate = serde_json::Map::new();
        for dep in &deps {
            let id = &dep.action_id;
            enriched.insert(format!("_dep_{}", id), dep.output.clone());
            enriched.insert(format!("_dep_{}_status", id), json!(dep.status));
            enriched.insert(format!("_dep_{}_success", id), json!(dep.is_successful()));
            aggregate.insert(
                id.clone(),
                json!({
                    "status": dep.status,
                    "success": dep.is_successful(),
                    "result": dep.output,
                }),
            );
        }
        enriched.insert("_dependencies".to_string(), Value::Object(aggregate));

        tracing::trace!(action_id, injected = deps.len(), "dependencies injected");
        enriched
    }

    /// Snapshot of every stored result.
    pub fn all_results(&self) -> HashMap<String, ActionResult> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_store_and_get() {
        let ctx = ExecutionContext::new();
        assert!(ctx.store_result(&TraceEvent::success(
            "a",
            json!({"x": 1}),
            0.1,
            Parameters::new()
        )));
        let r = ctx.get_result("a").unwrap();
        assert!(r.is_successful());
        assert_eq!(r.field("x"), Some(&json!(1)));
        assert_eq!(r.error, None);
        assert!(ctx.has_result("a"));
        assert!(!ctx.has_result("b"));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_store_rejects_second_write() {
        let ctx = ExecutionContext::new();
        assert!(ctx.store_result(&TraceEvent::failure("a", "first", Parameters::new())));
        assert!(!ctx.store_result(&TraceEvent::success("a", json!(1), 0.0, Parameters::new())));
        let r = ctx.get_result("a").unwrap();
        assert_eq!(r.status, ActionStatus::Fail);
        assert_eq!(r.error.as_deref(), Some("first"));
    }

    #[test]
    fn test_inject_success_dependency() {
        let ctx = ExecutionContext::new();
        ctx.store_result(&TraceEvent::success("A", json!({"x": 1}), 0.0, Parameters::new()));

        let mut params = Parameters::new();
        params.insert("style".into(), json!("abstract"));
        let enriched = ctx.inject_dependencies("B", &ids(&["A"]), &params);

        assert_eq!(enriched["style"], json!("abstract"));
        assert_eq!(enriched["_dep_A"], json!({"x": 1}));
        assert_eq!(enriched["_dep_A_status"], json!("SUCCESS"));
        assert_eq!(enriched["_dep_A_success"], json!(true));
        assert_eq!(
            enriched["_dependencies"]["A"],
            json!({"status": "SUCCESS", "success": true, "result": {"x": 1}})
        );
        // original parameters untouched
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_inject_failed_dependency() {
        let ctx = ExecutionContext::new();
        ctx.store_result(&TraceEvent::failure("A", "boom", Parameters::new()));
        let enriched = ctx.inject_dependencies("B", &ids(&["A"]), &Parameters::new());
        assert_eq!(enriched["_dep_A_success"], json!(false));
        assert_eq!(enriched["_dep_A_status"], json!("FAIL"));
        assert_eq!(enriched["_dep_A"], json!({"error": "boom"}));
    }

    #[test]
    fn test_inject_skips_missing() {
        let ctx = ExecutionContext::new();
        ctx.store_result(&TraceEvent::success("A", json!(1), 0.0, Parameters::new()));
        let enriched = ctx.inject_dependencies("C", &ids(&["A", "missing"]), &Parameters::new());
        assert!(enriched.contains_key("_dep_A"));
        assert!(!enriched.contains_key("_dep_missing"));
        assert_eq!(enriched["_dependencies"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_inject_no_results_adds_nothing() {
        let ctx = ExecutionContext::new();
        let mut params = Parameters::new();
        params.insert("goal".into(), json!("g"));
        let enriched = ctx.inject_dependencies("B", &ids(&["A"]), &params);
        assert_eq!(enriched, params);
        assert!(!enriched.contains_key("_dependencies"));
    }

    #[test]
    fn test_concurrent_stores_lose_nothing() {
        let ctx = Arc::new(ExecutionContext::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    let id = format!("a{}", i);
                    let event = TraceEvent::success(id.as_str(), json!(i), 0.0, Parameters::new());
                    ctx.store_result(&event);
                    ctx.inject_dependencies(&id, &[id.clone()], &Parameters::new())
                })
            })
            .collect();
        for h in handles {
            let enriched = h.join().unwrap();
            assert_eq!(enriched.len(), 4);
        }
        assert_eq!(ctx.len(), 16);
        assert_eq!(ctx.all_results().len(), 16);
        ctx.clear();
        assert!(ctx.is_empty());
    }
}
