//! Execution trace: the append-only record of one run.
//!
//! The scheduler owns the trace while a run is in flight and hands it to the
//! caller once every reachable action has settled. Callers only read it:
//! appending is crate-private.

pub mod eventlog;

use crate::core::error::{Result, WeftError};
use crate::core::types::{ActionStatus, Parameters};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One settled attempt of one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// RFC 3339 UTC
    pub timestamp: String,
    pub action_id: String,
    pub status: ActionStatus,
    /// Backend output on success, `{"error": ...}` on failure
    pub payload: Value,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub metadata: Parameters,
}

impl TraceEvent {
    pub fn success(
        action_id: impl Into<String>,
        payload: Value,
        cost: f64,
        metadata: Parameters,
    ) -> Self {
        Self {
            timestamp: eventlog::now_rfc3339(),
            action_id: action_id.into(),
            status: ActionStatus::Success,
            payload,
            cost,
            metadata,
        }
    }

    pub fn failure(action_id: impl Into<String>, error: &str, metadata: Parameters) -> Self {
        Self {
            timestamp: eventlog::now_rfc3339(),
            action_id: action_id.into(),
            status: ActionStatus::Fail,
            payload: serde_json::json!({ "error": error }),
            cost: 0.0,
            metadata,
        }
    }

    /// Error message carried by a FAIL event's payload.
    pub fn error_message(&self) -> Option<&str> {
        if self.status != ActionStatus::Fail {
            return None;
        }
        self.payload.get("error").and_then(Value::as_str)
    }
}

/// Aggregate statistics derived from a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStats {
    pub total_events: usize,
    /// Distinct action ids seen
    pub total_actions: usize,
    /// Actions whose latest event is SUCCESS
    pub completed_actions: usize,
    /// Actions whose latest event is FAIL
    pub failed_actions: usize,
    /// Percentage in [0, 100]
    pub success_rate: f64,
    pub duration_seconds: f64,
    pub total_cost: f64,
    /// Event count per status
    pub status_counts: IndexMap<ActionStatus, usize>,
}

/// Ordered ledger of trace events for one plan run.
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    plan_id: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    events: Vec<TraceEvent>,
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl ExecutionTrace {
    pub(crate) fn new(plan_id: impl Into<String>) -> Self {
        Self {
            plan_id: plan_id.into(),
            started_at: Utc::now(),
            finished_at: None,
            events: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events for an action, oldest first.
    pub fn events_for<'a>(&'a self, action_id: &'a str) -> impl Iterator<Item = &'a TraceEvent> {
        self.events.iter().filter(move |e| e.action_id == action_id)
    }

    /// The authoritative event for an action: the most recent one.
    pub fn latest_for(&self, action_id: &str) -> Option<&TraceEvent> {
        self.events.iter().rev().find(|e| e.action_id == action_id)
    }

    /// Most recent event per action id, in first-seen order.
    pub fn latest_results(&self) -> IndexMap<&str, &TraceEvent> {
        let mut latest: IndexMap<&str, &TraceEvent> = IndexMap::new();
        for event in &self.events {
            latest.insert(event.action_id.as_str(), event);
        }
        latest
    }

    pub fn events_with_status(&self, status: ActionStatus) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter().filter(move |e| e.status == status)
    }

    /// One `ActionExecution` error per action whose latest event is FAIL.
    pub fn failures(&self) -> Vec<WeftError> {
        self.latest_results()
            .into_values()
            .filter(|e| e.status == ActionStatus::Fail)
            .map(|e| WeftError::ActionExecution {
                action_id: e.action_id.clone(),
                message: e.error_message().unwrap_or("no error message").to_string(),
            })
            .collect()
    }

    pub fn total_cost(&self) -> f64 {
        self.events.iter().map(|e| e.cost).sum()
    }

    /// True when every action's latest event is SUCCESS (vacuously true when empty).
    pub fn all_succeeded(&self) -> bool {
        self.latest_results()
            .values()
            .all(|e| e.status == ActionStatus::Success)
    }

    pub fn duration_seconds(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn stats(&self) -> TraceStats {
        let latest = self.latest_results();
        let total_actions = latest.len();
        let completed_actions = latest
            .values()
            .filter(|e| e.status == ActionStatus::Success)
            .count();
        let failed_actions = latest
            .values()
            .filter(|e| e.status == ActionStatus::Fail)
            .count();
        let success_rate = if total_actions == 0 {
            0.0
        } else {
            completed_actions as f64 / total_actions as f64 * 100.0
        };

        let mut status_counts: IndexMap<ActionStatus, usize> = IndexMap::new();
        for event in &self.events {
            *status_counts.entry(event.status).or_insert(0) += 1;
        }

        TraceStats {
            total_events: self.events.len(),
            total_actions,
            completed_actions,
            failed_actions,
            success_rate,
            duration_seconds: self.duration_seconds(),
            total_cost: self.total_cost(),
            status_counts,
        }
    }

    /// Serialize the events as a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.events)?)
    }

    /// Append every event to a JSONL file.
    pub fn write_jsonl(&self, path: &Path) -> Result<()> {
        eventlog::append_events(path, &self.events)
    }
}
