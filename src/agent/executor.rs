//! Agent executor: the inner LLM+tool loop (spec §4.3).

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::llm::{LlmClient, Message, ToolCall, ToolDefinition};
use crate::tool::{schema, ExecutionContext, ToolError, ToolExecutor, ToolRegistry, ToolResult};

use super::model::{Agent, AgentResult, AgentState, ResourceUsage};

/// Runs one agent to completion against a tool registry and an `LlmClient`.
pub struct AgentExecutor {
    tools: Arc<ToolRegistry>,
    tool_executor: Arc<ToolExecutor>,
    llm: Arc<dyn LlmClient>,
}

impl AgentExecutor {
    pub fn new(tools: Arc<ToolRegistry>, tool_executor: Arc<ToolExecutor>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            tools,
            tool_executor,
            llm,
        }
    }

    fn initial_messages(&self, agent: &Agent) -> Vec<Message> {
        let mut messages = Vec::new();

        let mut system = format!("You are a {} agent.\n\n{}", agent.config.agent_type, agent.task);
        if !agent.config.prompt_addendum.is_empty() {
            system.push('\n');
            system.push_str(&agent.config.prompt_addendum);
        }
        system.push_str("\n\nWhen you are done, finish with a concise summary of what you did.");
        messages.push(Message::system(system));

        if agent.config.inherit_context && !agent.context.parent_messages.is_empty() {
            let summary = summarize_parent_messages(&agent.context.parent_messages);
            messages.push(Message::system(format!("Parent context summary:\n{summary}")));
        }

        messages.push(Message::user(agent.task.clone()));
        messages
    }

    fn filtered_tools(&self, agent: &Agent) -> Vec<ToolDefinition> {
        let all = self.tools.list_all();
        let selected = match &agent.config.tools {
            None => all,
            Some(names) => all
                .into_iter()
                .filter(|t| names.iter().any(|n| n == &t.descriptor().name))
                .collect(),
        };
        selected
            .into_iter()
            .map(|t| {
                let descriptor = t.descriptor();
                let openai = schema::to_openai_schema(&descriptor);
                ToolDefinition {
                    name: descriptor.name,
                    description: descriptor.description,
                    parameters: openai["function"]["parameters"].clone(),
                }
            })
            .collect()
    }

    /// Runs `agent` from `pending` to a terminal state, stamping the result
    /// onto the agent as a side effect.
    pub async fn execute(&self, agent: &Arc<Agent>) {
        *agent.state.lock().expect("agent state lock poisoned") = AgentState::Running;
        *agent.started_at.lock().expect("agent started_at lock poisoned") = Some(Utc::now());

        let start = Instant::now();
        let mut messages = self.initial_messages(agent);
        let model = agent.config.model.clone().unwrap_or_default();
        let tools = self.filtered_tools(agent);
        let mut partial_output = String::new();
        let cancel_token = agent.cancel_token();

        let outcome = 'agent_loop: loop {
            {
                let mut usage = agent.usage.lock().expect("agent usage lock poisoned");
                usage.time_seconds = start.elapsed().as_secs();
                if let Some(name) = usage.exceeds(&agent.config.limits) {
                    break 'agent_loop AgentResult::fail(format!("Resource limit exceeded: {name}"), partial_output.clone(), *usage);
                }
            }

            if agent.is_cancelled() {
                let usage = agent.usage();
                break 'agent_loop AgentResult::cancelled(partial_output.clone(), usage);
            }

            {
                let mut usage = agent.usage.lock().expect("agent usage lock poisoned");
                usage.iterations += 1;
            }

            // Race the LLM round-trip against cancellation so an agent
            // suspended here is interrupted in place rather than left
            // running after the scheduler gives up waiting on it (spec §5).
            let response = tokio::select! {
                biased;
                () = cancel_token.cancelled() => {
                    let usage = agent.usage();
                    break 'agent_loop AgentResult::cancelled(partial_output.clone(), usage);
                }
                result = self.llm.complete(&messages, &tools, &model) => match result {
                    Ok(r) => r,
                    Err(e) => {
                        let usage = agent.usage();
                        break 'agent_loop AgentResult::fail(e.to_string(), partial_output.clone(), usage);
                    }
                },
            };

            {
                let mut usage = agent.usage.lock().expect("agent usage lock poisoned");
                usage.tokens_used += response.usage.total_tokens;
            }

            if !response.tool_calls.is_empty() {
                for call in &response.tool_calls {
                    {
                        let mut usage = agent.usage.lock().expect("agent usage lock poisoned");
                        usage.tool_calls += 1;
                    }
                    // Same rationale as the LLM race above: a tool call
                    // blocked on I/O (e.g. a foreground `bash`) must be
                    // interrupted here, not merely flagged for the next
                    // iteration, so a cancelled agent never leaves a
                    // stray process or a stuck task behind (spec §4.1, §7).
                    let result = tokio::select! {
                        biased;
                        () = cancel_token.cancelled() => {
                            let usage = agent.usage();
                            break 'agent_loop AgentResult::cancelled(partial_output.clone(), usage);
                        }
                        result = self.invoke_tool(agent, call) => result,
                    };
                    partial_output.push_str(&result.output);
                    partial_output.push('\n');
                    messages.push(Message::tool(call.id.clone(), result.output));
                }
                *agent.messages.lock().expect("agent messages lock poisoned") = messages.clone();
                continue;
            }

            let usage = agent.usage();
            let output = response.content.unwrap_or_default();
            break 'agent_loop AgentResult::success(output, usage);
        };

        *agent.completed_at.lock().expect("agent completed_at lock poisoned") = Some(Utc::now());
        let final_state = if outcome.error.as_deref() == Some("cancelled") {
            AgentState::Cancelled
        } else if outcome.success {
            AgentState::Completed
        } else {
            AgentState::Failed
        };
        *agent.state.lock().expect("agent state lock poisoned") = final_state;
        *agent.result.lock().expect("agent result lock poisoned") = Some(outcome);

        info!(agent_id = %agent.id, state = ?final_state, "agent run finished");
    }

    async fn invoke_tool(&self, agent: &Agent, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult::error(ToolError::NotFound(call.name.clone()).to_string());
        };
        let working_dir = agent
            .context
            .working_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
        let ctx = ExecutionContext::new(working_dir, agent.id.clone(), agent.id.clone())
            .with_cancel(agent.cancel_token());
        self.tool_executor.execute(tool, ctx, call.arguments.clone()).await
    }
}

/// Renders the most recent parent messages, each truncated to 200
/// characters, as the "parent context summary" a child agent sees when
/// `config.inherit_context` is set (spec §4.3).
fn summarize_parent_messages(messages: &[Message]) -> String {
    const MAX_MESSAGES: usize = 5;
    const MAX_CHARS: usize = 200;

    messages
        .iter()
        .rev()
        .take(MAX_MESSAGES)
        .rev()
        .map(|m| {
            let content: String = m.content.chars().take(MAX_CHARS).collect();
            format!("[{:?}] {}", m.role, content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model::{AgentConfig, AgentContext};
    use crate::llm::{LlmError, LlmResponse, Usage};
    use crate::shell::ShellManager;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _messages: &[Message], _tools: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(LlmResponse {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "call_1".into(),
                        name: "bash".into(),
                        arguments: json!({"command": "echo hi"}),
                    }],
                    usage: Usage { total_tokens: 10 },
                })
            } else {
                Ok(LlmResponse {
                    content: Some("done".into()),
                    tool_calls: vec![],
                    usage: Usage { total_tokens: 5 },
                })
            }
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        Arc::new(crate::tools::standard_registry(Arc::new(ShellManager::new())))
    }

    #[tokio::test]
    async fn successful_run_completes_with_output() {
        let executor = AgentExecutor::new(
            registry(),
            Arc::new(ToolExecutor::default()),
            Arc::new(ScriptedLlm { calls: AtomicUsize::new(0) }),
        );
        let agent = Agent::new("do a thing", AgentConfig::new("general"), AgentContext::default());
        executor.execute(&agent).await;

        assert_eq!(agent.state(), AgentState::Completed);
        let result = agent.result().unwrap();
        assert!(result.success);
        assert_eq!(result.output, "done");
        assert_eq!(result.usage.tool_calls, 1);
        assert_eq!(result.usage.iterations, 2);
    }

    #[tokio::test]
    async fn unknown_tool_reports_not_found_but_continues() {
        struct OneBadCall {
            calls: AtomicUsize,
        }
        #[async_trait]
        impl LlmClient for OneBadCall {
            async fn complete(&self, _m: &[Message], _t: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok(LlmResponse {
                        content: None,
                        tool_calls: vec![ToolCall {
                            id: "call_1".into(),
                            name: "does_not_exist".into(),
                            arguments: json!({}),
                        }],
                        usage: Usage::default(),
                    })
                } else {
                    Ok(LlmResponse {
                        content: Some("ok".into()),
                        tool_calls: vec![],
                        usage: Usage::default(),
                    })
                }
            }
        }
        let executor = AgentExecutor::new(
            registry(),
            Arc::new(ToolExecutor::default()),
            Arc::new(OneBadCall { calls: AtomicUsize::new(0) }),
        );
        let agent = Agent::new("task", AgentConfig::new("general"), AgentContext::default());
        executor.execute(&agent).await;
        assert_eq!(agent.state(), AgentState::Completed);
        let result = agent.result().unwrap();
        assert!(result.output.contains("Tool not found: does_not_exist"));
    }

    #[tokio::test]
    async fn resource_limit_exceeded_fails_with_partial_output() {
        struct AlwaysToolCalls;
        #[async_trait]
        impl LlmClient for AlwaysToolCalls {
            async fn complete(&self, _m: &[Message], _t: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
                Ok(LlmResponse {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "call".into(),
                        name: "bash".into(),
                        arguments: json!({"command": "echo looping"}),
                    }],
                    usage: Usage { total_tokens: 1 },
                })
            }
        }
        let mut config = AgentConfig::new("general");
        config.limits.max_iterations = 2;
        let executor = AgentExecutor::new(registry(), Arc::new(ToolExecutor::default()), Arc::new(AlwaysToolCalls));
        let agent = Agent::new("loop forever", config, AgentContext::default());
        executor.execute(&agent).await;

        assert_eq!(agent.state(), AgentState::Failed);
        let result = agent.result().unwrap();
        assert!(result.error.unwrap().contains("Resource limit exceeded: max_iterations"));
        assert!(result.output.contains("looping"));
    }

    #[tokio::test]
    async fn cancellation_before_first_iteration_yields_cancelled() {
        struct Unreachable;
        #[async_trait]
        impl LlmClient for Unreachable {
            async fn complete(&self, _m: &[Message], _t: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
                panic!("must not be called once cancelled");
            }
        }
        let executor = AgentExecutor::new(registry(), Arc::new(ToolExecutor::default()), Arc::new(Unreachable));
        let agent = Agent::new("task", AgentConfig::new("general"), AgentContext::default());
        agent.cancel();
        executor.execute(&agent).await;
        assert_eq!(agent.state(), AgentState::Cancelled);
    }
}
