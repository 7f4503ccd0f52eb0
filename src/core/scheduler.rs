//! Scheduler: drives a plan to completion against registered backends.
//!
//! Per action: PENDING → RUNNING → (SUCCESS | FAIL), with up to
//! `max_retries` extra attempts before settling as FAIL. Every settle writes
//! exactly one trace event and one context result; retries only show up in
//! the settled event's metadata.
//!
//! Sequential mode walks the topological order. Parallel mode runs one
//! dependency level at a time, fanning the level out over at most
//! `max_workers` concurrent tasks, so a dependent never starts before all its
//! dependencies have settled.
//!
//! Runs are uninterruptible: once started, every reachable action settles.
//! Dropping the `run` future aborts in-flight workers. Every action runs on
//! its own task in both modes, so a panicking backend settles that action as
//! FAIL (`reason: worker_aborted`) instead of unwinding out of `run`.

use super::compiler;
use super::config::{DependencyFailurePolicy, ExecutionMode, RuntimeConfig};
use super::context::ExecutionContext;
use super::error::{Result, WeftError};
use super::parser;
use super::plan::ExecutionPlan;
use super::types::{AtomicAction, Intent, Parameters};
use crate::backends::{BackendAdapter, BackendError, BackendRegistry, BackendResponse};
use crate::trace::{ExecutionTrace, TraceEvent};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Everything a finished run hands back to the caller.
#[derive(Debug)]
pub struct RunOutput {
    pub trace: ExecutionTrace,
    pub context: Arc<ExecutionContext>,
}

/// Explicitly constructed scheduler: construct → register backends → run.
#[derive(Debug, Default)]
pub struct Scheduler {
    config: RuntimeConfig,
    backends: BackendRegistry,
}

impl Scheduler {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            backends: BackendRegistry::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Register a backend under `name`. The first registration is the default.
    pub fn register_backend<B>(&mut self, name: impl Into<String>, backend: B) -> &mut Self
    where
        B: BackendAdapter + 'static,
    {
        self.backends.register(name, Arc::new(backend));
        self
    }

    /// Register a backend the caller keeps a handle to.
    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn BackendAdapter>,
    ) -> &mut Self {
        self.backends.register(name, backend);
        self
    }

    /// Compile an intent and run the resulting plan.
    pub async fn compile_and_run(
        &self,
        intent: &Intent,
        auto_dependencies: bool,
    ) -> Result<RunOutput> {
        let plan = compiler::compile(intent, auto_dependencies);
        self.run_with_context(&plan).await
    }

    /// Run a plan and return its trace.
    ///
    /// `Ok` does not mean every action succeeded: inspect the trace.
    pub async fn run(&self, plan: &ExecutionPlan) -> Result<ExecutionTrace> {
        Ok(self.run_with_context(plan).await?.trace)
    }

    /// Run a plan and return both the trace and the final context.
    pub async fn run_with_context(&self, plan: &ExecutionPlan) -> Result<RunOutput> {
        self.preflight(plan)?;

        let state = Arc::new(RunState {
            backends: self.backends.clone(),
            config: self.config.clone(),
            context: Arc::new(ExecutionContext::new()),
            trace: Mutex::new(ExecutionTrace::new(plan.plan_id.clone())),
        });

        info!(
            plan_id = %plan.plan_id,
            actions = plan.len(),
            mode = ?self.config.mode,
            "run started"
        );

        match self.config.mode {
            ExecutionMode::Sequential => {
                for action in plan.execution_order()? {
                    // a one-task set, so dropping the run still aborts the worker
                    let mut worker = JoinSet::new();
                    worker.spawn(settle_and_record(Arc::clone(&state), action.clone()));
                    if let Some(Err(e)) = worker.join_next().await {
                        error!(action_id = %action.action_id, error = %e, "worker task aborted");
                    }
                    state.record_aborted(&action.action_id);
                }
            }
            ExecutionMode::Parallel => run_levels(&state, plan).await?,
        }

        let mut trace = std::mem::take(&mut *state.lock_trace());
        trace.finish();

        let stats = trace.stats();
        info!(
            plan_id = %plan.plan_id,
            completed = stats.completed_actions,
            failed = stats.failed_actions,
            total_cost = stats.total_cost,
            duration_seconds = stats.duration_seconds,
            "run finished"
        );

        Ok(RunOutput {
            trace,
            context: Arc::clone(&state.context),
        })
    }

    /// Fail fast on anything that would make the whole run meaningless.
    fn preflight(&self, plan: &ExecutionPlan) -> Result<()> {
        let problems = parser::validate_config(&self.config);
        if !problems.is_empty() {
            let joined: Vec<String> = problems.iter().map(ToString::to_string).collect();
            return Err(WeftError::Configuration(joined.join("; ")));
        }

        if self.backends.is_empty() {
            return Err(WeftError::Configuration("no backend registered".to_string()));
        }

        plan.validate_strict()?;

        if self.config.strict_backend_hints {
            for action in &plan.actions {
                if let Some(hint) = action.backend_hint.as_deref() {
                    if !self.backends.contains(hint) {
                        return Err(WeftError::Configuration(format!(
                            "action '{}' requests unregistered backend '{}'",
                            action.action_id, hint
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Execute a plan level by level with a bounded worker pool.
async fn run_levels(state: &Arc<RunState>, plan: &ExecutionPlan) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(state.config.max_workers));

    for (depth, level) in plan.levels()?.into_iter().enumerate() {
        debug!(level = depth, actions = level.len(), "level started");

        let mut workers = JoinSet::new();
        for action in &level {
            let state = Arc::clone(state);
            let semaphore = Arc::clone(&semaphore);
            let action = (*action).clone();
            workers.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                settle_and_record(state, action).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(level = depth, error = %e, "worker task aborted");
            }
        }

        for action in &level {
            state.record_aborted(&action.action_id);
        }
    }

    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Worker body shared by both modes. Runs on its own task so a panicking
/// backend takes down only this action.
async fn settle_and_record(state: Arc<RunState>, action: AtomicAction) {
    let event = state.settle(&action).await;
    state.record(event);
}

/// Shared per-run state. Only the context map and the trace are written
/// concurrently, each under its own mutex.
struct RunState {
    backends: BackendRegistry,
    config: RuntimeConfig,
    context: Arc<ExecutionContext>,
    trace: Mutex<ExecutionTrace>,
}

impl RunState {
    fn lock_trace(&self) -> std::sync::MutexGuard<'_, ExecutionTrace> {
        self.trace.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write a settled event to the context and the trace.
    fn record(&self, event: TraceEvent) {
        if self.context.store_result(&event) {
            self.lock_trace().append(event);
        }
    }

    /// Settle an action whose worker died before recording anything.
    fn record_aborted(&self, action_id: &str) {
        if self.context.has_result(action_id) {
            return;
        }
        let mut metadata = Parameters::new();
        metadata.insert("reason".into(), json!("worker_aborted"));
        self.record(TraceEvent::failure(
            action_id,
            "worker aborted before the action settled",
            metadata,
        ));
    }

    /// Take one action from PENDING to a terminal status.
    async fn settle(&self, action: &AtomicAction) -> TraceEvent {
        let action_id = action.action_id.as_str();

        if self.config.on_dependency_failure == DependencyFailurePolicy::Skip {
            let failed: Vec<String> = self
                .context
                .dependency_results(&action.dependencies)
                .into_iter()
                .filter(|r| !r.is_successful())
                .map(|r| r.action_id)
                .collect();
            if !failed.is_empty() {
                warn!(action_id, failed_dependencies = ?failed, "skipping, dependency failed");
                let mut metadata = Parameters::new();
                metadata.insert("reason".into(), json!("dependency_failed"));
                metadata.insert("failed_dependencies".into(), json!(failed));
                metadata.insert("retries".into(), json!(0));
                metadata.insert("attempts".into(), json!(0));
                let message = format!("dependency '{}' failed", failed.join("', '"));
                return TraceEvent::failure(action_id, &message, metadata);
            }
        }

        let parameters =
            self.context
                .inject_dependencies(action_id, &action.dependencies, &action.parameters);

        let Some((backend_name, backend)) = self.backends.select(action.backend_hint.as_deref())
        else {
            let mut metadata = Parameters::new();
            metadata.insert("attempts".into(), json!(0));
            return TraceEvent::failure(action_id, "no backend registered", metadata);
        };

        let retry = &self.config.retry;
        let started = Instant::now();
        let mut last_error = String::new();

        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                let delay = retry.delay_for(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            debug!(action_id, backend = backend_name, attempt, "dispatching");
            match self.attempt(backend.as_ref(), action, &parameters).await {
                Ok(response) => {
                    let mut metadata = Parameters::new();
                    metadata.insert("retries".into(), json!(attempt));
                    metadata.insert("attempts".into(), json!(u64::from(attempt) + 1));
                    metadata.insert("backend".into(), json!(backend_name));
                    metadata.insert("action_type".into(), json!(action.action_type));
                    metadata.insert("duration_ms".into(), json!(elapsed_ms(started)));
                    metadata.insert("prompt_units".into(), json!(response.usage.prompt_units));
                    metadata.insert(
                        "completion_units".into(),
                        json!(response.usage.completion_units),
                    );
                    metadata.insert("total_units".into(), json!(response.usage.total_units));
                    metadata.insert("model".into(), json!(response.usage.backend_name));
                    return TraceEvent::success(
                        action_id,
                        response.output,
                        response.usage.cost,
                        metadata,
                    );
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < retry.max_retries {
                        warn!(action_id, attempt, error = %e, "attempt failed, retrying");
                    }
                }
            }
        }

        error!(
            action_id,
            backend = backend_name,
            attempts = retry.max_attempts(),
            error = %last_error,
            "action failed"
        );
        let mut metadata = Parameters::new();
        metadata.insert("retries".into(), json!(retry.max_retries));
        metadata.insert("attempts".into(), json!(retry.max_attempts()));
        metadata.insert("backend".into(), json!(backend_name));
        metadata.insert("action_type".into(), json!(action.action_type));
        metadata.insert("duration_ms".into(), json!(elapsed_ms(started)));
        metadata.insert("final_attempt".into(), json!(true));
        TraceEvent::failure(action_id, &last_error, metadata)
    }

    /// One backend call, bounded by the configured attempt timeout.
    async fn attempt(
        &self,
        backend: &dyn BackendAdapter,
        action: &AtomicAction,
        parameters: &Parameters,
    ) -> std::result::Result<BackendResponse, BackendError> {
        match self.config.attempt_timeout() {
            Some(limit) => tokio::time::timeout(limit, backend.execute(action, parameters))
                .await
                .unwrap_or_else(|_| Err(BackendError::Timeout(limit))),
            None => backend.execute(action, parameters).await,
        }
    }
}
