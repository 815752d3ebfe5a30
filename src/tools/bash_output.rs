//! `BashOutput` — polls a background shell's incremental output (spec §4.2).

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::shell::{ShellError, ShellManager};
use crate::tool::{
    ExecutionContext, ParamSpec, ParamType, Tool, ToolCategory, ToolDescriptor, ToolResult,
};

#[derive(Debug, Deserialize)]
struct BashOutputInput {
    bash_id: String,
    #[serde(default)]
    filter: Option<String>,
}

/// Reads whatever output a background shell has produced since the last
/// poll, optionally restricted to lines matching a regex filter.
pub struct BashOutputTool {
    shells: Arc<ShellManager>,
}

impl BashOutputTool {
    pub fn new(shells: Arc<ShellManager>) -> Self {
        Self { shells }
    }
}

#[async_trait]
impl Tool for BashOutputTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "bash_output",
            "Retrieves new output from a background shell started with bash's \
             run_in_background option, optionally filtered by a regex.",
            ToolCategory::Execution,
        )
        .with_params(vec![
            ParamSpec::new("bash_id", ParamType::String, "id of the background shell to poll").required(),
            ParamSpec::new(
                "filter",
                ParamType::String,
                "regex; only lines matching it are returned",
            ),
        ])
    }

    async fn run(&self, _ctx: ExecutionContext, args: Value) -> ToolResult {
        let input: BashOutputInput = match serde_json::from_value(args) {
            Ok(i) => i,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let filter = match input.filter.as_deref().map(Regex::new) {
            Some(Ok(re)) => Some(re),
            Some(Err(e)) => return ToolResult::error(ShellError::InvalidFilter(e.to_string()).to_string()),
            None => None,
        };

        let Some(process) = self.shells.get_shell(&input.bash_id).await else {
            return ToolResult::error(ShellError::NotFound(input.bash_id).to_string());
        };

        let status = process.status().await;
        let is_running = process.is_running().await;
        let exit_code = process.exit_code().await;
        let duration_ms = process.duration_ms().await;

        let output = process.get_new_output(true).await;
        let output = match &filter {
            Some(re) => output
                .lines()
                .filter(|line| re.is_match(line))
                .collect::<Vec<_>>()
                .join("\n"),
            None => output,
        };

        let mut status_line = format!("Status: {status:?}");
        if let Some(code) = exit_code {
            status_line.push_str(&format!(", Exit code: {code}"));
        }
        if let Some(ms) = duration_ms {
            status_line.push_str(&format!(", Duration: {ms}ms"));
        }
        let body = if output.is_empty() {
            status_line
        } else {
            format!("{status_line}\n{output}")
        };

        ToolResult::ok(body)
            .with_metadata("bash_id", json!(input.bash_id))
            .with_metadata("status", json!(format!("{status:?}")))
            .with_metadata("exit_code", json!(exit_code))
            .with_metadata("is_running", json!(is_running))
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
        let tool = BashOutputTool::new(shells);
        let result = tool.run(ctx(), json!({"bash_id": "shell_deadbeef"})).await;
        assert!(!result.ok);
        assert!(result.output.contains("Shell not found"));
    }

    #[tokio::test]
    async fn invalid_filter_regex_errors() {
        let shells = Arc::new(ShellManager::new());
        let process = shells
            .create_shell("echo hi", std::env::temp_dir(), None)
            .await
            .unwrap();
        shells.track(process.clone()).await;
        let tool = BashOutputTool::new(shells);
        let result = tool
            .run(ctx(), json!({"bash_id": process.id, "filter": "("}))
            .await;
        assert!(!result.ok);
        assert!(result.output.contains("Invalid filter regex"));
    }

    #[tokio::test]
    async fn reads_output_incrementally_and_applies_filter() {
        let shells = Arc::new(ShellManager::new());
        let process = shells
            .create_shell("echo keep && echo drop", std::env::temp_dir(), None)
            .await
            .unwrap();
        shells.track(process.clone()).await;

        for _ in 0..50 {
            if process.status().await.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let tool = BashOutputTool::new(shells);
        let result = tool
            .run(ctx(), json!({"bash_id": process.id, "filter": "keep"}))
            .await;
        assert!(result.ok);
        assert!(result.output.contains("keep"));
        assert!(!result.output.contains("drop"));
        assert_eq!(result.metadata["is_running"], json!(false));
    }
}
