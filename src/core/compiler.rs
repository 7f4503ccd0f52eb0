//! Intent → ExecutionPlan compilation.
//!
//! One action per goal, typed by keyword classification, parameters seeded
//! with the goal and the intent's constraints. Optionally chains the actions
//! into a linear pipeline.

use super::error::{Result, WeftError};
use super::parser;
use super::plan::ExecutionPlan;
use super::types::{ActionType, AtomicAction, Intent, Parameters};
use crate::trace::eventlog;
use serde_json::Value;

/// Constraint key whose string value becomes every action's backend hint.
pub const BACKEND_CONSTRAINT: &str = "backend";

/// Compile an intent into a fresh plan.
///
/// Never fails: an intent with no goals yields an empty, valid plan.
pub fn compile(intent: &Intent, auto_dependencies: bool) -> ExecutionPlan {
    let backend_hint = intent
        .constraints
        .get(BACKEND_CONSTRAINT)
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut actions: Vec<AtomicAction> = Vec::with_capacity(intent.goals.len());
    for (i, goal) in intent.goals.iter().enumerate() {
        let mut parameters = Parameters::with_capacity(intent.constraints.len() + 1);
        parameters.insert("goal".to_string(), Value::String(goal.clone()));
        // constraints win on key clashes, matching a plain map merge
        parameters.extend(intent.constraints.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut action = AtomicAction::new(action_id(i), ActionType::classify(goal));
        action.parameters = parameters;
        action.backend_hint = backend_hint.clone();
        if auto_dependencies && i > 0 {
            action = action.depends_on(action_id(i - 1));
        }
        actions.push(action);
    }

    let plan = ExecutionPlan::new(eventlog::generate_plan_id(), actions);
    tracing::debug!(
        plan_id = %plan.plan_id,
        actions = plan.len(),
        auto_dependencies,
        "intent compiled"
    );
    plan
}

/// Compile after rejecting intents with blank goals.
pub fn compile_checked(intent: &Intent, auto_dependencies: bool) -> Result<ExecutionPlan> {
    let errors = parser::validate_intent(intent);
    if !errors.is_empty() {
        let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(WeftError::Compilation(joined.join("; ")));
    }
    Ok(compile(intent, auto_dependencies))
}

/// Action id for the goal at `index`.
pub fn action_id(index: usize) -> String {
    format!("action_{}", index)
}
