//! `Bash` — foreground and background shell execution (spec §4.2).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::shell::{policy, ShellManager, ShellStatus};
use crate::tool::{
    ExecutionContext, ParamSpec, ParamType, Tool, ToolCategory, ToolDescriptor, ToolResult,
};

const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const MAX_TIMEOUT_MS: u64 = 600_000;
const MAX_OUTPUT_CHARS: usize = 30_000;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Deserialize)]
struct BashInput {
    command: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    run_in_background: bool,
}

/// Executes shell commands, foreground or background, through the shared
/// `ShellManager`.
pub struct BashTool {
    shells: Arc<ShellManager>,
}

impl BashTool {
    pub fn new(shells: Arc<ShellManager>) -> Self {
        Self { shells }
    }

    fn truncate(output: &str) -> (String, bool) {
        if output.chars().count() <= MAX_OUTPUT_CHARS {
            return (output.to_string(), false);
        }
        let truncated: String = output.chars().take(MAX_OUTPUT_CHARS).collect();
        (
            format!("{truncated}\n[output truncated at {MAX_OUTPUT_CHARS} characters]"),
            true,
        )
    }

    async fn start_background(&self, command: &str, ctx: &ExecutionContext) -> ToolResult {
        match self
            .shells
            .create_shell(command, ctx.working_dir.clone(), None)
            .await
        {
            Ok(process) => {
                let id = process.id.clone();
                self.shells.track(process).await;
                ToolResult::ok(format!("Started background shell: {id}"))
                    .with_metadata("bash_id", json!(id))
                    .with_metadata("command", json!(command))
            }
            Err(e) => ToolResult::error(format!("failed to start background shell: {e}")),
        }
    }

    async fn run_foreground(&self, command: &str, ctx: &ExecutionContext, timeout_ms: u64) -> ToolResult {
        let process = match self
            .shells
            .create_shell(command, ctx.working_dir.clone(), None)
            .await
        {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("failed to spawn process: {e}")),
        };
        self.shells.track(process.clone()).await;

        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if process.status().await.is_terminal() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                process.timeout().await;
                return ToolResult::error(format!("timed out after {timeout_ms}ms"))
                    .with_metadata("timeout_ms", json!(timeout_ms));
            }
            tokio::select! {
                () = tokio::time::sleep(POLL_INTERVAL) => {}
                () = ctx.cancel.cancelled() => {
                    process.kill().await;
                    return ToolResult::error("cancelled");
                }
            }
        }

        let output = process.get_new_output(true).await;
        let (output, truncated) = Self::truncate(&output);
        let exit_code = process.exit_code().await.unwrap_or(-1);

        if process.status().await == ShellStatus::Completed && exit_code == 0 {
            ToolResult::ok(output)
                .with_metadata("exit_code", json!(exit_code))
                .with_metadata("truncated", json!(truncated))
                .with_metadata("command", json!(command))
        } else {
            ToolResult::error(format!("Command failed with exit code {exit_code}\n{output}"))
                .with_metadata("exit_code", json!(exit_code))
                .with_metadata("truncated", json!(truncated))
        }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "bash",
            "Executes a shell command via bash -c, returning combined stdout/stderr. \
             Use run_in_background for long-lived processes; poll with bash_output.",
            ToolCategory::Execution,
        )
        .with_params(vec![
            ParamSpec::new("command", ParamType::String, "shell command to execute").required(),
            ParamSpec::new("description", ParamType::String, "human-readable description of the command"),
            ParamSpec::new(
                "timeout",
                ParamType::Integer,
                "timeout in milliseconds (default 120000, max 600000)",
            )
            .with_range(Some(0.0), Some(MAX_TIMEOUT_MS as f64)),
            ParamSpec::new(
                "run_in_background",
                ParamType::Boolean,
                "if true, return immediately with a shell id instead of waiting",
            ),
        ])
    }

    async fn run(&self, ctx: ExecutionContext, args: Value) -> ToolResult {
        let input: BashInput = match serde_json::from_value(args) {
            Ok(i) => i,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        if input.command.trim().is_empty() {
            return ToolResult::error("command cannot be empty");
        }

        let timeout_ms = input.timeout.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms > MAX_TIMEOUT_MS {
            return ToolResult::error(format!("timeout must be <= {MAX_TIMEOUT_MS}ms"));
        }

        if let Some(reason) = policy::check(&input.command) {
            return ToolResult::error(format!(
                "command blocked: matches a dangerous pattern ({reason})"
            ));
        }

        if ctx.dry_run {
            return ToolResult::ok(format!(
                "[dry run] would execute: {}{}",
                input.command,
                input
                    .description
                    .as_ref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default()
            ));
        }

        if input.run_in_background {
            return self.start_background(&input.command, &ctx).await;
        }

        self.run_foreground(&input.command, &ctx, timeout_ms).await
    }
}
