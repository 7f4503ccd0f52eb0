//! Weft: compile declarative intents into action DAGs and run them.
//!
//! Intent → compiler → execution plan → scheduler → backends, with every
//! settled action recorded in an append-only execution trace.

pub mod backends;
pub mod cli;
pub mod core;
pub mod trace;

pub use crate::backends::{
    BackendAdapter, BackendError, BackendRegistry, BackendResponse, BackendUsage,
};
pub use crate::core::compiler::{compile, compile_checked};
pub use crate::core::config::{
    Backoff, DependencyFailurePolicy, ExecutionMode, RetryPolicy, RuntimeConfig,
};
pub use crate::core::context::{ActionResult, ExecutionContext};
pub use crate::core::error::{Result, WeftError};
pub use crate::core::plan::{ExecutionPlan, ValidationOutcome};
pub use crate::core::scheduler::{RunOutput, Scheduler};
pub use crate::core::types::{ActionStatus, ActionType, AtomicAction, Intent, Parameters};
pub use crate::trace::{ExecutionTrace, TraceEvent, TraceStats};
