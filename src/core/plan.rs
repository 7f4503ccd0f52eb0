//! Execution plan: the DAG of atomic actions.
//!
//! `validate` checks references; `execution_order` is the cycle detector.
//! Ordering uses Kahn's algorithm seeded and expanded in declaration order,
//! so the same plan always yields the same order.

use super::error::{Result, WeftError};
use super::types::AtomicAction;
use crate::trace::eventlog;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Outcome of a reference check: `(ok, error)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub error: Option<String>,
}

impl ValidationOutcome {
    fn valid() -> Self {
        Self { ok: true, error: None }
    }

    fn invalid(message: String) -> Self {
        Self {
            ok: false,
            error: Some(message),
        }
    }
}

/// A compiled, read-only DAG of actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    #[serde(default = "eventlog::generate_plan_id")]
    pub plan_id: String,

    /// Actions in declaration order
    #[serde(default)]
    pub actions: Vec<AtomicAction>,
}

impl ExecutionPlan {
    pub fn new(plan_id: impl Into<String>, actions: Vec<AtomicAction>) -> Self {
        Self {
            plan_id: plan_id.into(),
            actions,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn get(&self, action_id: &str) -> Option<&AtomicAction> {
        self.actions.iter().find(|a| a.action_id == action_id)
    }

    /// Check that action ids are unique and every dependency names an
    /// action in this plan. Does not look for cycles.
    pub fn validate(&self) -> ValidationOutcome {
        match self.index() {
            Ok(_) => ValidationOutcome::valid(),
            Err(e) => ValidationOutcome::invalid(e),
        }
    }

    /// `validate` plus cycle detection, as a `Result`.
    pub fn validate_strict(&self) -> Result<()> {
        self.execution_order().map(|_| ())
    }

    /// Map each action id to its position, rejecting duplicates and
    /// dangling dependency references.
    fn index(&self) -> std::result::Result<HashMap<&str, usize>, String> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.actions.len());
        for (pos, action) in self.actions.iter().enumerate() {
            if index.insert(action.action_id.as_str(), pos).is_some() {
                return Err(format!("duplicate action id '{}'", action.action_id));
            }
        }
        for action in &self.actions {
            for dep in &action.dependencies {
                if !index.contains_key(dep.as_str()) {
                    return Err(format!(
                        "action '{}' depends on unknown '{}'",
                        action.action_id, dep
                    ));
                }
            }
        }
        Ok(index)
    }

    /// Topological execution order via Kahn's algorithm.
    ///
    /// Zero in-degree actions are seeded in declaration order and dependents
    /// are released in adjacency order, so ties always break the same way.
    /// A cycle is a hard error naming every action left unordered.
    pub fn execution_order(&self) -> Result<Vec<&AtomicAction>> {
        let index = self.index().map_err(WeftError::PlanValidation)?;
        let n = self.actions.len();

        let mut in_degree: Vec<usize> = vec![0; n];
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (pos, action) in self.actions.iter().enumerate() {
            for dep in &action.dependencies {
                // index() already rejected dangling references
                if let Some(&dep_pos) = index.get(dep.as_str()) {
                    adjacency[dep_pos].push(pos);
                    in_degree[pos] += 1;
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(current) = queue.pop_front() {
            order.push(current);
            for &next in &adjacency[current] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() != n {
            let ordered: HashSet<usize> = order.iter().copied().collect();
            let cycle_members: Vec<&str> = (0..n)
                .filter(|i| !ordered.contains(i))
                .map(|i| self.actions[i].action_id.as_str())
                .collect();
            return Err(WeftError::PlanValidation(format!(
                "dependency cycle detected involving: {}",
                cycle_members.join(", ")
            )));
        }

        Ok(order.into_iter().map(|i| &self.actions[i]).collect())
    }

    /// Execution order as action ids.
    pub fn execution_ids(&self) -> Result<Vec<&str>> {
        Ok(self
            .execution_order()?
            .into_iter()
            .map(|a| a.action_id.as_str())
            .collect())
    }

    /// Partition the DAG into levels: level 0 has no dependencies, level k
    /// holds actions whose deepest dependency sits in level k-1. Within a
    /// level actions keep their execution-order position.
    pub fn levels(&self) -> Result<Vec<Vec<&AtomicAction>>> {
        let order = self.execution_order()?;
        let mut depth: HashMap<&str, usize> = HashMap::with_capacity(order.len());
        let mut levels: Vec<Vec<&AtomicAction>> = Vec::new();

        for action in order {
            let level = action
                .dependencies
                .iter()
                .filter_map(|d| depth.get(d.as_str()))
                .map(|&d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(action.action_id.as_str(), level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(action);
        }

        Ok(levels)
    }
}
