//! CLI subcommands: compile, validate, run.
//!
//! Machine-readable output (plans, traces) goes to stdout as JSON; logs go
//! to stderr.

use crate::backends::{LocalBackend, MockBackend};
use crate::core::config::{ExecutionMode, RuntimeConfig};
use crate::core::plan::ExecutionPlan;
use crate::core::scheduler::Scheduler;
use crate::core::{compiler, parser};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile an intent file into an execution plan (JSON on stdout)
    Compile {
        /// Path to the intent (YAML or JSON)
        #[arg(short, long, default_value = "intent.yaml")]
        file: PathBuf,

        /// Chain each action onto the previous one
        #[arg(long)]
        auto_deps: bool,
    },

    /// Validate a plan (or an intent with --intent) and show its execution order
    Validate {
        /// Path to the plan or intent
        #[arg(short, long, default_value = "plan.yaml")]
        file: PathBuf,

        /// Treat the file as an intent and compile it first
        #[arg(long)]
        intent: bool,

        /// Chain actions when compiling an intent
        #[arg(long)]
        auto_deps: bool,
    },

    /// Compile and run an intent against the built-in backends
    Run {
        /// Path to the intent (or plan with --plan)
        #[arg(short, long, default_value = "intent.yaml")]
        file: PathBuf,

        /// Treat the file as a precompiled plan
        #[arg(long)]
        plan: bool,

        /// Chain each action onto the previous one
        #[arg(long)]
        auto_deps: bool,

        /// Runtime config file
        #[arg(short, long, env = "WEFT_CONFIG")]
        config: Option<PathBuf>,

        /// Run independent actions concurrently, level by level
        #[arg(long)]
        parallel: bool,

        /// Worker bound for parallel mode
        #[arg(long)]
        max_workers: Option<usize>,

        /// Retries per action after the first attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Simulated latency of the mock backend in milliseconds
        #[arg(long, default_value_t = 0)]
        mock_latency_ms: u64,

        /// Also append the trace to this JSONL file
        #[arg(long)]
        jsonl: Option<PathBuf>,
    },
}

/// Dispatch a CLI command.
pub async fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Compile { file, auto_deps } => cmd_compile(&file, auto_deps),
        Commands::Validate {
            file,
            intent,
            auto_deps,
        } => cmd_validate(&file, intent, auto_deps),
        Commands::Run {
            file,
            plan,
            auto_deps,
            config,
            parallel,
            max_workers,
            max_retries,
            mock_latency_ms,
            jsonl,
        } => {
            let overrides = RunOverrides {
                parallel,
                max_workers,
                max_retries,
            };
            let config = load_config(config.as_deref(), &overrides)?;
            let plan = load_plan(&file, !plan, auto_deps)?;
            cmd_run(
                &plan,
                config,
                Duration::from_millis(mock_latency_ms),
                jsonl.as_deref(),
            )
            .await
        }
    }
}

/// Command-line settings layered over the config file.
#[derive(Debug, Default)]
struct RunOverrides {
    parallel: bool,
    max_workers: Option<usize>,
    max_retries: Option<u32>,
}

fn load_config(path: Option<&Path>, overrides: &RunOverrides) -> Result<RuntimeConfig, String> {
    let mut config = match path {
        Some(p) => parser::parse_config_file(p).map_err(|e| e.to_string())?,
        None => RuntimeConfig::default(),
    };
    if overrides.parallel {
        config.mode = ExecutionMode::Parallel;
    }
    if let Some(n) = overrides.max_workers {
        config.max_workers = n;
    }
    if let Some(n) = overrides.max_retries {
        config.retry.max_retries = n;
    }

    let errors = parser::validate_config(&config);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(format!("{} config error(s)", errors.len()));
    }
    Ok(config)
}

/// Load a plan from disk, compiling it first when the file is an intent.
fn load_plan(file: &Path, is_intent: bool, auto_deps: bool) -> Result<ExecutionPlan, String> {
    if is_intent {
        let intent = parser::parse_intent_file(file).map_err(|e| e.to_string())?;
        compiler::compile_checked(&intent, auto_deps).map_err(|e| e.to_string())
    } else {
        parser::parse_plan_file(file).map_err(|e| e.to_string())
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), String> {
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("JSON error: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_compile(file: &Path, auto_deps: bool) -> Result<(), String> {
    let plan = load_plan(file, true, auto_deps)?;
    print_json(&plan)
}

fn cmd_validate(file: &Path, is_intent: bool, auto_deps: bool) -> Result<(), String> {
    let plan = load_plan(file, is_intent, auto_deps)?;

    let outcome = plan.validate();
    if let Some(error) = outcome.error {
        eprintln!("  ERROR: {}", error);
        return Err("plan is invalid".to_string());
    }

    let levels = plan.levels().map_err(|e| e.to_string())?;
    println!("Plan {}: {} action(s)", plan.plan_id, plan.len());
    for (depth, level) in levels.iter().enumerate() {
        let ids: Vec<&str> = level.iter().map(|a| a.action_id.as_str()).collect();
        println!("  level {}: {}", depth, ids.join(", "));
    }
    println!("OK");
    Ok(())
}

async fn cmd_run(
    plan: &ExecutionPlan,
    config: RuntimeConfig,
    mock_latency: Duration,
    jsonl: Option<&Path>,
) -> Result<(), String> {
    let mut scheduler = Scheduler::new(config);
    scheduler
        .register_backend("mock", MockBackend::new("mock").with_latency(mock_latency))
        .register_backend("local", LocalBackend::new());

    let trace = scheduler.run(plan).await.map_err(|e| e.to_string())?;

    if let Some(path) = jsonl {
        trace.write_jsonl(path).map_err(|e| e.to_string())?;
    }

    let stats = trace.stats();
    print_json(&serde_json::json!({
        "plan_id": trace.plan_id(),
        "events": trace.events(),
        "stats": stats,
    }))?;

    let failures = trace.failures();
    if !failures.is_empty() {
        for failure in &failures {
            eprintln!("  FAIL: {}", failure);
        }
        return Err(format!(
            "{} of {} action(s) failed",
            stats.failed_actions, stats.total_actions
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_config_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "weft.yaml", "max_workers: 8\nretry:\n  max_retries: 1\n");
        let overrides = RunOverrides {
            parallel: true,
            max_workers: None,
            max_retries: Some(5),
        };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.mode, ExecutionMode::Parallel);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let overrides = RunOverrides {
            max_workers: Some(0),
            ..RunOverrides::default()
        };
        assert!(load_config(None, &overrides).is_err());
    }

    #[test]
    fn test_load_plan_from_intent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "intent.yaml", "goals: [generate_base, transform_it]\n");
        let plan = load_plan(&path, true, true).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.actions[1].dependencies.contains("action_0"));
    }

    #[test]
    fn test_validate_cycle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "plan.yaml",
            r#"
actions:
  - action_id: a
    action_type: generate
    dependencies: [b]
  - action_id: b
    action_type: generate
    dependencies: [a]
"#,
        );
        let err = cmd_validate(&path, false, false).unwrap_err();
        assert!(err.contains("cycle"));
    }

    #[test]
    fn test_validate_dangling_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "plan.yaml",
            "actions:\n  - action_id: a\n    action_type: generate\n    dependencies: [ghost]\n",
        );
        assert_eq!(cmd_validate(&path, false, false).unwrap_err(), "plan is invalid");
    }

    #[tokio::test]
    async fn test_run_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "intent.yaml", "goals: [a, b, c]\n");
        let out = dir.path().join("trace.jsonl");
        let plan = load_plan(&path, true, true).unwrap();
        cmd_run(&plan, RuntimeConfig::parallel(2), Duration::ZERO, Some(&out))
            .await
            .unwrap();
        let events = crate::trace::eventlog::read_events(&out).unwrap();
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_run_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        // the local backend needs a script; this one exits non-zero
        let path = write(
            dir.path(),
            "plan.yaml",
            r#"
actions:
  - action_id: broken
    action_type: generate
    backend_hint: local
    parameters:
      script: "exit 3"
"#,
        );
        let plan = load_plan(&path, false, false).unwrap();
        let config = RuntimeConfig::default().with_retry(crate::core::config::RetryPolicy::none());
        let err = cmd_run(&plan, config, Duration::ZERO, None).await.unwrap_err();
        assert_eq!(err, "1 of 1 action(s) failed");
    }
}
