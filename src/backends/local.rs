//! Local shell backend.
//!
//! Runs the action's `script` parameter through `bash` on this machine.
//! Upstream results are exported as JSON in `WEFT_DEPENDENCIES`, the goal
//! (if any) in `WEFT_GOAL`. A non-zero exit is a failed attempt.

use super::{BackendAdapter, BackendError, BackendResponse, BackendUsage};
use crate::core::types::{AtomicAction, Parameters};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Parameter holding the shell script.
pub const SCRIPT_PARAM: &str = "script";

#[derive(Debug, Clone)]
pub struct LocalBackend {
    shell: String,
}

impl Default for LocalBackend {
    fn default() -> Self {
        // bash, not sh: scripts may use `set -o pipefail`
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

#[async_trait]
impl BackendAdapter for LocalBackend {
    async fn execute(
        &self,
        action: &AtomicAction,
        parameters: &Parameters,
    ) -> Result<BackendResponse, BackendError> {
        let script = parameters
            .get(SCRIPT_PARAM)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                BackendError::InvalidParameters(format!(
                    "action '{}' has no '{}' parameter",
                    action.action_id, SCRIPT_PARAM
                ))
            })?;

        let dependencies = parameters
            .get("_dependencies")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let goal = parameters.get("goal").and_then(Value::as_str).unwrap_or("");

        let mut child = Command::new(&self.shell)
            .env("WEFT_ACTION_ID", &action.action_id)
            .env("WEFT_GOAL", goal)
            .env("WEFT_DEPENDENCIES", dependencies.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Failed(format!("failed to spawn {}: {}", self.shell, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| BackendError::Failed(format!("stdin write error: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| BackendError::Failed(format!("wait error: {}", e)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if exit_code != 0 {
            return Err(BackendError::Failed(format!(
                "exit code {}: {}",
                exit_code,
                stderr.trim()
            )));
        }

        let usage = BackendUsage::new(
            "local",
            script.len() as u64,
            stdout.len() as u64,
            0.0,
        );
        Ok(BackendResponse {
            output: json!({
                "exit_code": exit_code,
                "stdout": stdout,
                "stderr": stderr,
            }),
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ActionType;

    fn script_action(id: &str, script: &str) -> AtomicAction {
        AtomicAction::new(id, ActionType::Generate).with_param(SCRIPT_PARAM, script)
    }

    #[tokio::test]
    async fn test_local_echo() {
        let a = script_action("a", "echo hello");
        let resp = LocalBackend::new().execute(&a, &a.parameters).await.unwrap();
        assert_eq!(resp.output["stdout"].as_str().unwrap().trim(), "hello");
        assert_eq!(resp.output["exit_code"], json!(0));
        assert_eq!(resp.usage.backend_name, "local");
    }

    #[tokio::test]
    async fn test_local_failure() {
        let a = script_action("a", "echo nope >&2\nexit 42");
        let err = LocalBackend::new().execute(&a, &a.parameters).await.unwrap_err();
        assert_eq!(err, BackendError::Failed("exit code 42: nope".into()));
    }

    #[tokio::test]
    async fn test_local_pipefail() {
        let a = script_action("a", "set -euo pipefail\nfalse | true");
        assert!(LocalBackend::new().execute(&a, &a.parameters).await.is_err());
    }

    #[tokio::test]
    async fn test_local_missing_script() {
        let a = AtomicAction::new("a", ActionType::Generate);
        let err = LocalBackend::new().execute(&a, &a.parameters).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_local_sees_environment() {
        let a = script_action("step", "echo \"$WEFT_ACTION_ID $WEFT_GOAL $WEFT_DEPENDENCIES\"")
            .with_param("goal", "g");
        let mut params = a.parameters.clone();
        params.insert("_dependencies".into(), json!({"up": {"success": true}}));
        let resp = LocalBackend::new().execute(&a, &params).await.unwrap();
        let out = resp.output["stdout"].as_str().unwrap().trim().to_string();
        assert!(out.starts_with("step g "));
        assert!(out.contains("\"up\""));
    }
}
