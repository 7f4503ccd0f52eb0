//! Runtime configuration: execution mode, worker bound, retry policy,
//! dependency-failure policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration. Every field has a default, so an empty YAML
/// document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Sequential or level-parallel execution
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Worker bound per level in parallel mode
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Retry bound and backoff
    #[serde(default)]
    pub retry: RetryPolicy,

    /// What happens to an action whose dependency failed
    #[serde(default)]
    pub on_dependency_failure: DependencyFailurePolicy,

    /// Per-attempt timeout in milliseconds (unbounded when absent)
    #[serde(default)]
    pub attempt_timeout_ms: Option<u64>,

    /// Reject unregistered backend hints instead of falling back
    #[serde(default)]
    pub strict_backend_hints: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_workers: default_max_workers(),
            retry: RetryPolicy::default(),
            on_dependency_failure: DependencyFailurePolicy::default(),
            attempt_timeout_ms: None,
            strict_backend_hints: false,
        }
    }
}

impl RuntimeConfig {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn parallel(max_workers: usize) -> Self {
        Self {
            mode: ExecutionMode::Parallel,
            max_workers,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dependency_policy(mut self, policy: DependencyFailurePolicy) -> Self {
        self.on_dependency_failure = policy;
        self
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

fn default_max_workers() -> usize {
    4
}

/// Execution strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

/// Handling of an action whose dependency settled as FAIL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyFailurePolicy {
    /// Do not dispatch; settle immediately as FAIL (reason `dependency_failed`)
    #[default]
    Skip,
    /// Dispatch anyway; the failed dependency is injected with `_dep_<id>_success = false`
    Attempt,
}

/// Bounded retries with an explicit backoff strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: Backoff::None,
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::None,
        }
    }

    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { ms } => Duration::from_millis(ms),
            Backoff::Exponential { base_ms, max_ms } => {
                let exp = retry.saturating_sub(1).min(32);
                let delay = base_ms.saturating_mul(1u64 << exp);
                Duration::from_millis(delay.min(max_ms))
            }
        }
    }
}

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    None,
    Fixed { ms: u64 },
    Exponential { base_ms: u64, max_ms: u64 },
}
