//! `KillShell` — forcibly terminates a background shell (spec §4.2).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::shell::{ShellError, ShellManager};
use crate::tool::{
    ExecutionContext, ParamSpec, ParamType, Tool, ToolCategory, ToolDescriptor, ToolResult,
};

#[derive(Debug, Deserialize)]
struct KillShellInput {
    shell_id: String,
}

/// Kills a background shell's process group. Idempotent: killing a shell
/// that has already finished reports `already_stopped` rather than erroring.
pub struct KillShellTool {
    shells: Arc<ShellManager>,
}

impl KillShellTool {
    pub fn new(shells: Arc<ShellManager>) -> Self {
        Self { shells }
    }
}

#[async_trait]
impl Tool for KillShellTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "kill_shell",
            "Terminates a background shell started with bash's run_in_background option.",
            ToolCategory::Execution,
        )
        .with_params(vec![ParamSpec::new(
            "shell_id",
            ParamType::String,
            "id of the background shell to kill",
        )
        .required()])
    }

    async fn run(&self, _ctx: ExecutionContext, args: Value) -> ToolResult {
        let input: KillShellInput = match serde_json::from_value(args) {
            Ok(i) => i,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let Some(process) = self.shells.get_shell(&input.shell_id).await else {
            return ToolResult::error(ShellError::NotFound(input.shell_id).to_string());
        };

        if !process.is_running().await {
            return ToolResult::ok(format!("Shell {} is not running", input.shell_id))
                .with_metadata("shell_id", json!(input.shell_id))
                .with_metadata("already_stopped", json!(true));
        }

        process.kill().await;
        let duration_ms = process.duration_ms().await;

        ToolResult::ok(format!("Killed shell {}", input.shell_id))
            .with_metadata("shell_id", json!(input.shell_id))
            .with_metadata("duration_ms", json!(duration_ms))
            .with_metadata("command", json!(process.command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(std::env::temp_dir(), "sess", "agent")
    }

    #[tokio::test]
    async fn unknown_shell_id_errors() {
        let shells = Arc::new(ShellManager::new());
        let tool = KillShellTool::new(shells);
        let result = tool.run(ctx(), json!({"shell_id": "shell_deadbeef"})).await;
        assert!(!result.ok);
        assert!(result.output.contains("Shell not found"));
    }

    #[tokio::test]
    async fn killing_finished_shell_reports_already_stopped() {
        let shells = Arc::new(ShellManager::new());
        let process = shells
            .create_shell("echo hi", std::env::temp_dir(), None)
            .await
            .unwrap();
        shells.track(process.clone()).await;
        for _ in 0..50 {
            if process.status().await.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let tool = KillShellTool::new(shells);
        let result = tool.run(ctx(), json!({"shell_id": process.id})).await;
        assert!(result.ok);
        assert_eq!(result.metadata["already_stopped"], json!(true));
    }

    #[tokio::test]
    async fn killing_running_shell_terminates_it() {
        let shells = Arc::new(ShellManager::new());
        let process = shells
            .create_shell("sleep 30", std::env::temp_dir(), None)
            .await
            .unwrap();
        shells.track(process.clone()).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let tool = KillShellTool::new(shells);
        let result = tool.run(ctx(), json!({"shell_id": process.id})).await;
        assert!(result.ok);
        assert!(result.metadata.get("already_stopped").is_none());
        assert_eq!(process.status().await, crate::shell::ShellStatus::Killed);
    }
}
