//! Agent data model (spec §3): identity, config, context, state, usage, and
//! results.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::llm::Message;

/// `pending -> running -> {completed | failed | cancelled}`, plus
/// `pending -> cancelled` directly. No other transition is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Per-run resource ceilings (spec §3). All fields must be strictly
/// positive; the executor compares `ResourceUsage` against these every
/// iteration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_tokens: u64,
    pub max_time_seconds: u64,
    pub max_tool_calls: u64,
    pub max_iterations: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            max_time_seconds: 300,
            max_tool_calls: 50,
            max_iterations: 25,
        }
    }
}

/// Running totals, monotonically non-decreasing during a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub tokens_used: u64,
    pub time_seconds: u64,
    pub tool_calls: u64,
    pub iterations: u64,
}

impl ResourceUsage {
    /// Returns the name of the first exceeded limit, if any.
    pub fn exceeds(&self, limits: &ResourceLimits) -> Option<&'static str> {
        if self.tokens_used > limits.max_tokens {
            return Some("max_tokens");
        }
        if self.time_seconds > limits.max_time_seconds {
            return Some("max_time_seconds");
        }
        if self.tool_calls > limits.max_tool_calls {
            return Some("max_tool_calls");
        }
        if self.iterations > limits.max_iterations {
            return Some("max_iterations");
        }
        None
    }
}

/// Static-ish per-spawn configuration (spec §3). Built by
/// `AgentConfig::for_type` from an `AgentTypeDefinition`, or overridden by
/// the caller.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_type: String,
    pub description: String,
    pub prompt_addendum: String,
    pub tools: Option<Vec<String>>,
    pub inherit_context: bool,
    pub limits: ResourceLimits,
    pub model: Option<String>,
}

impl AgentConfig {
    pub fn new(agent_type: impl Into<String>) -> Self {
        Self {
            agent_type: agent_type.into(),
            description: String::new(),
            prompt_addendum: String::new(),
            tools: None,
            inherit_context: false,
            limits: ResourceLimits::default(),
            model: None,
        }
    }
}

/// Carries whatever parent-agent state a subagent may inherit (spec §3).
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub parent_messages: Vec<Message>,
    pub working_dir: Option<std::path::PathBuf>,
    pub env: HashMap<String, String>,
    pub metadata: HashMap<String, Value>,
    pub parent_agent_id: Option<String>,
}

/// Outcome of one agent run (spec §3). Deliberately flat and
/// serde-round-trippable: it is the unit the manager aggregates and the
/// shape session storage persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub usage: ResourceUsage,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub completed_at: DateTime<Utc>,
}

impl AgentResult {
    pub fn success(output: impl Into<String>, usage: ResourceUsage) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
            error: None,
            usage,
            metadata: HashMap::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn fail(message: impl Into<String>, partial_output: impl Into<String>, usage: ResourceUsage) -> Self {
        Self {
            success: false,
            output: partial_output.into(),
            data: None,
            error: Some(message.into()),
            usage,
            metadata: HashMap::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn cancelled(partial_output: impl Into<String>, usage: ResourceUsage) -> Self {
        Self {
            success: false,
            output: partial_output.into(),
            data: None,
            error: Some("cancelled".to_string()),
            usage,
            metadata: HashMap::new(),
            completed_at: Utc::now(),
        }
    }
}

/// Totals and counts over a batch of `AgentResult`s (spec §3), returned by
/// `AgentManager::wait_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub results: Vec<AgentResult>,
    pub total_tokens: u64,
    pub total_time_seconds: u64,
    pub total_tool_calls: u64,
    pub success_count: usize,
    pub failure_count: usize,
}

impl AggregatedResult {
    pub fn from_results(results: Vec<AgentResult>) -> Self {
        let mut total_tokens = 0;
        let mut total_time_seconds = 0;
        let mut total_tool_calls = 0;
        let mut success_count = 0;
        let mut failure_count = 0;
        for r in &results {
            total_tokens += r.usage.tokens_used;
            total_time_seconds += r.usage.time_seconds;
            total_tool_calls += r.usage.tool_calls;
            if r.success {
                success_count += 1;
            } else {
                failure_count += 1;
            }
        }
        Self {
            results,
            total_tokens,
            total_time_seconds,
            total_tool_calls,
            success_count,
            failure_count,
        }
    }
}

/// A live or historical agent run (spec §3).
pub struct Agent {
    pub id: String,
    pub task: String,
    pub config: AgentConfig,
    pub context: AgentContext,
    pub state: std::sync::Mutex<AgentState>,
    pub created_at: DateTime<Utc>,
    pub started_at: std::sync::Mutex<Option<DateTime<Utc>>>,
    pub completed_at: std::sync::Mutex<Option<DateTime<Utc>>>,
    pub usage: std::sync::Mutex<ResourceUsage>,
    pub messages: std::sync::Mutex<Vec<Message>>,
    pub result: std::sync::Mutex<Option<AgentResult>>,
    /// Single source of truth for cancellation. Checked at the top of
    /// every executor iteration (spec §5) and also handed down into each
    /// tool call's `ExecutionContext` so a suspended LLM call or tool
    /// invocation is interrupted in place rather than relying on the
    /// scheduler aborting the task out from under it (spec §4.1, §7).
    cancel_token: CancellationToken,
}

impl Agent {
    pub fn new(task: impl Into<String>, config: AgentConfig, context: AgentContext) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            task: task.into(),
            config,
            context,
            state: std::sync::Mutex::new(AgentState::Pending),
            created_at: Utc::now(),
            started_at: std::sync::Mutex::new(None),
            completed_at: std::sync::Mutex::new(None),
            usage: std::sync::Mutex::new(ResourceUsage::default()),
            messages: std::sync::Mutex::new(Vec::new()),
            result: std::sync::Mutex::new(None),
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().expect("agent state lock poisoned")
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Sets the cancellation flag. The executor observes it at the top of
    /// its next iteration and races it against any in-flight LLM or tool
    /// call (spec §5). Idempotent; has no effect on a terminal agent's
    /// recorded result.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn usage(&self) -> ResourceUsage {
        *self.usage.lock().expect("agent usage lock poisoned")
    }

    pub fn result(&self) -> Option<AgentResult> {
        self.result.lock().expect("agent result lock poisoned").clone()
    }
}
