//! Minimal line-oriented driver wiring the shell manager, tool executor,
//! and command dispatcher together.
//!
//! This binary is a demonstration harness, not the product REPL: it has no
//! LLM client (that capability is consumed, never implemented, by this
//! crate — see `agentcore::llm::LlmClient`) and no session persistence.
//! Lines starting with `/` go through the command dispatcher; everything
//! else runs as a shell command via the `bash` tool.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use agentcore::command::{self, Command, CommandCategory, CommandContext, CommandRegistry, CommandResult, ParsedCommand};
use agentcore::shell::ShellManager;
use agentcore::tool::{ExecutionContext, ToolExecutor};
use agentcore::tools;
use async_trait::async_trait;
use serde_json::json;

struct ExitCommand;

#[async_trait]
impl Command for ExitCommand {
    fn name(&self) -> &str {
        "exit"
    }
    fn aliases(&self) -> &[&str] {
        &["quit", "q"]
    }
    fn description(&self) -> &str {
        "exit the session"
    }
    fn category(&self) -> CommandCategory {
        CommandCategory::Control
    }
    async fn execute(&self, _parsed: &ParsedCommand, _ctx: &CommandContext) -> CommandResult {
        CommandResult::ok("bye").with_action("exit")
    }
}

struct HelpCommand {
    names: Vec<&'static str>,
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }
    fn description(&self) -> &str {
        "list available commands"
    }
    async fn execute(&self, _parsed: &ParsedCommand, _ctx: &CommandContext) -> CommandResult {
        CommandResult::ok(format!("available commands: {}", self.names.join(", ")))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let shells = Arc::new(ShellManager::new());
    let tool_registry = Arc::new(tools::standard_registry(shells));
    let tool_executor = ToolExecutor::default();

    let mut registry = CommandRegistry::new();
    registry.register(Arc::new(ExitCommand)).expect("exit registers once");
    registry
        .register(Arc::new(HelpCommand { names: vec!["exit", "help"] }))
        .expect("help registers once");

    let ctx = CommandContext::default();
    let working_dir = std::env::current_dir().unwrap_or_default();

    let stdin = io::stdin();
    print!("> ");
    let _ = io::stdout().flush();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            print!("> ");
            let _ = io::stdout().flush();
            continue;
        }

        if command::is_command(&line) {
            let result = command::execute(&line, &registry, &ctx).await;
            println!("{}", result.message);
            if result.action.as_deref() == Some("exit") {
                break;
            }
        } else {
            let bash = tool_registry.get("bash").expect("bash tool always registered");
            let exec_ctx = ExecutionContext::new(working_dir.clone(), "repl", "repl");
            let result = tool_executor.execute(bash, exec_ctx, json!({"command": line})).await;
            println!("{}", result.output);
        }

        print!("> ");
        let _ = io::stdout().flush();
    }
}
