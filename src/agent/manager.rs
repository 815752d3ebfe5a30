//! Agent manager / scheduler (spec §4.4): owns live and historical agents,
//! gates execution behind a semaphore, and delivers aggregated results.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::AgentError;
use super::executor::AgentExecutor;
use super::model::{Agent, AgentConfig, AgentContext, AggregatedResult, AgentResult, AgentState};
use super::types::AgentTypeRegistry;

pub type CompletionCallback = Box<dyn Fn(&Agent) + Send + Sync>;

/// Schedules and tracks agent runs under a fixed maximum concurrency
/// (default 5, spec §4.4).
pub struct AgentManager {
    executor: Arc<AgentExecutor>,
    types: AgentTypeRegistry,
    max_concurrent: usize,
    semaphore: OnceLock<Arc<Semaphore>>,
    agents: Mutex<HashMap<String, Arc<Agent>>>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    callbacks: Arc<Mutex<Vec<CompletionCallback>>>,
}

impl AgentManager {
    pub fn new(executor: Arc<AgentExecutor>) -> Self {
        Self::with_max_concurrent(executor, 5)
    }

    pub fn with_max_concurrent(executor: Arc<AgentExecutor>, max_concurrent: usize) -> Self {
        Self {
            executor,
            types: AgentTypeRegistry::new(),
            max_concurrent,
            semaphore: OnceLock::new(),
            agents: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Created lazily so a manager can be built outside a running executor
    /// (spec §4.4).
    fn semaphore(&self) -> Arc<Semaphore> {
        self.semaphore
            .get_or_init(|| Arc::new(Semaphore::new(self.max_concurrent)))
            .clone()
    }

    /// Spawns an agent of `agent_type`, optionally waiting for it to finish.
    pub async fn spawn(
        &self,
        agent_type: &str,
        task: impl Into<String>,
        config: Option<AgentConfig>,
        context: Option<AgentContext>,
        wait: bool,
    ) -> Arc<Agent> {
        let config = config.unwrap_or_else(|| self.types.resolve(agent_type).default_config());
        let agent = Agent::new(task, config, context.unwrap_or_default());

        self.agents.lock().await.insert(agent.id.clone(), agent.clone());

        let handle = self.schedule(agent.clone());
        if wait {
            let _ = handle.await;
        } else {
            self.tasks.lock().await.insert(agent.id.clone(), handle);
        }

        agent
    }

    fn schedule(&self, agent: Arc<Agent>) -> JoinHandle<()> {
        let executor = self.executor.clone();
        let semaphore = self.semaphore();
        let callbacks = self.callbacks.clone();

        tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            executor.execute(&agent).await;
            let callbacks = callbacks.lock().await;
            for cb in callbacks.iter() {
                if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(agent.as_ref()))) {
                    warn!(error = ?e, "agent completion callback panicked");
                }
            }
        })
    }

    /// Spawns several agents without waiting; returns handles in input
    /// order. The shared semaphore enforces the concurrency cap (spec
    /// §4.4).
    pub async fn spawn_parallel(&self, specs: Vec<(String, String)>) -> Vec<Arc<Agent>> {
        let mut handles = Vec::with_capacity(specs.len());
        for (agent_type, task) in specs {
            handles.push(self.spawn(&agent_type, task, None, None, false).await);
        }
        handles
    }

    /// Awaits the scheduled task for `id` (if still running) then returns
    /// its recorded result.
    pub async fn wait(&self, id: &str) -> Option<AgentResult> {
        if let Some(handle) = self.tasks.lock().await.remove(id) {
            let _ = handle.await;
        }
        let agents = self.agents.lock().await;
        let result = agents.get(id).and_then(|a| a.result());
        if result.is_none() {
            debug!(error = %AgentError::NotFound(id.to_string()), "wait: no recorded result for agent");
        }
        result
    }

    /// Awaits all scheduled tasks (or the given subset), tolerating
    /// individual failures, and aggregates the recorded results.
    pub async fn wait_all(&self, ids: Option<Vec<String>>) -> AggregatedResult {
        let ids = match ids {
            Some(ids) => ids,
            None => self.agents.lock().await.keys().cloned().collect(),
        };

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(result) = self.wait(id).await {
                results.push(result);
            }
        }
        AggregatedResult::from_results(results)
    }

    /// Sets the agent's cancellation flag. Returns true iff the id was
    /// known. Idempotent; has no effect on an already-terminal agent's
    /// recorded result (spec §5).
    ///
    /// This deliberately does not abort the scheduled task: the executor
    /// races every suspension point (the LLM call, each tool call) against
    /// this same flag (`agent::executor::execute`), so an agent blocked in
    /// either one unwinds itself into a `cancelled()` result and still
    /// reaches the state/result bookkeeping at the end of `execute` —
    /// aborting the task out from under it would skip that bookkeeping
    /// entirely and leave the agent stuck `Running` with no result.
    pub async fn cancel(&self, id: &str) -> bool {
        let agent = self.agents.lock().await.get(id).cloned();
        let Some(agent) = agent else {
            debug!(error = %AgentError::NotFound(id.to_string()), "cancel: unknown agent id");
            return false;
        };
        agent.cancel();
        true
    }

    pub async fn cancel_all(&self) -> usize {
        let ids: Vec<String> = self.agents.lock().await.keys().cloned().collect();
        let mut count = 0;
        for id in ids {
            if self.cancel(&id).await {
                count += 1;
            }
        }
        count
    }

    /// Registers a callback invoked after each agent terminates. Callback
    /// panics are caught and logged, never propagated (spec §4.4).
    pub async fn on_complete(&self, cb: CompletionCallback) {
        self.callbacks.lock().await.push(cb);
    }

    pub async fn get_stats(&self) -> ManagerStats {
        let agents = self.agents.lock().await;
        let mut stats = ManagerStats::default();
        for agent in agents.values() {
            match agent.state() {
                AgentState::Pending => stats.pending += 1,
                AgentState::Running => stats.running += 1,
                AgentState::Completed => stats.completed += 1,
                AgentState::Failed => stats.failed += 1,
                AgentState::Cancelled => stats.cancelled += 1,
            }
            let usage = agent.usage();
            stats.total_tokens += usage.tokens_used;
            stats.total_tool_calls += usage.tool_calls;
        }
        stats
    }

    /// Removes every terminal agent from the live map and task table.
    /// Returns the number removed.
    pub async fn cleanup_completed(&self) -> usize {
        let mut agents = self.agents.lock().await;
        let terminal: Vec<String> = agents
            .iter()
            .filter(|(_, a)| a.state().is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        let mut tasks = self.tasks.lock().await;
        for id in &terminal {
            agents.remove(id);
            tasks.remove(id);
        }
        terminal.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_tokens: u64,
    pub total_tool_calls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmClient, LlmError, LlmResponse, Message, ToolDefinition, Usage};
    use crate::shell::ShellManager;
    use crate::tool::ToolExecutor;
    use async_trait::async_trait;

    struct Echo;
    #[async_trait]
    impl LlmClient for Echo {
        async fn complete(&self, _m: &[Message], _t: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                content: Some("done".into()),
                tool_calls: vec![],
                usage: Usage::default(),
            })
        }
    }

    fn manager() -> AgentManager {
        let tools = Arc::new(crate::tools::standard_registry(Arc::new(ShellManager::new())));
        let executor = Arc::new(AgentExecutor::new(tools, Arc::new(ToolExecutor::default()), Arc::new(Echo)));
        AgentManager::with_max_concurrent(executor, 2)
    }

    #[tokio::test]
    async fn spawn_with_wait_returns_completed_agent() {
        let mgr = manager();
        let agent = mgr.spawn("general", "task", None, None, true).await;
        assert_eq!(agent.state(), AgentState::Completed);
    }

    #[tokio::test]
    async fn wait_all_aggregates_results() {
        let mgr = manager();
        mgr.spawn("general", "one", None, None, false).await;
        mgr.spawn("general", "two", None, None, false).await;
        let aggregated = mgr.wait_all(None).await;
        assert_eq!(aggregated.results.len(), 2);
        assert_eq!(aggregated.success_count, 2);
    }

    #[tokio::test]
    async fn cancel_unknown_id_returns_false() {
        let mgr = manager();
        assert!(!mgr.cancel("missing").await);
    }

    #[tokio::test]
    async fn cleanup_completed_empties_terminal_agents() {
        let mgr = manager();
        mgr.spawn("general", "task", None, None, true).await;
        let removed = mgr.cleanup_completed().await;
        assert_eq!(removed, 1);
        let stats = mgr.get_stats().await;
        assert_eq!(stats.completed, 0);
    }

    struct SlowOnce {
        peak_running: Arc<std::sync::atomic::AtomicUsize>,
        currently_running: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl LlmClient for SlowOnce {
        async fn complete(&self, _m: &[Message], _t: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
            let running = self.currently_running.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            self.peak_running.fetch_max(running, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.currently_running.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            Ok(LlmResponse {
                content: Some("done".into()),
                tool_calls: vec![],
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn max_concurrent_caps_simultaneous_running_agents() {
        let peak_running = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let currently_running = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let llm = Arc::new(SlowOnce {
            peak_running: peak_running.clone(),
            currently_running,
        });
        let tools = Arc::new(crate::tools::standard_registry(Arc::new(ShellManager::new())));
        let executor = Arc::new(AgentExecutor::new(tools, Arc::new(ToolExecutor::default()), llm));
        let mgr = AgentManager::with_max_concurrent(executor, 2);

        let specs = vec![
            ("explore".to_string(), "a".to_string()),
            ("explore".to_string(), "b".to_string()),
            ("explore".to_string(), "c".to_string()),
            ("explore".to_string(), "d".to_string()),
            ("explore".to_string(), "e".to_string()),
        ];
        let handles = mgr.spawn_parallel(specs).await;
        let ids: Vec<String> = handles.iter().map(|a| a.id.clone()).collect();
        let aggregated = mgr.wait_all(Some(ids)).await;

        assert_eq!(aggregated.results.len(), 5);
        assert_eq!(aggregated.success_count, 5);
        assert!(peak_running.load(std::sync::atomic::Ordering::SeqCst) <= 2);
    }

    struct NeverResponds;
    #[async_trait]
    impl LlmClient for NeverResponds {
        async fn complete(&self, _m: &[Message], _t: &[ToolDefinition], _model: &str) -> Result<LlmResponse, LlmError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancel_during_llm_call_still_finalizes_the_agent() {
        let tools = Arc::new(crate::tools::standard_registry(Arc::new(ShellManager::new())));
        let executor = Arc::new(AgentExecutor::new(tools, Arc::new(ToolExecutor::default()), Arc::new(NeverResponds)));
        let mgr = AgentManager::with_max_concurrent(executor, 2);

        let agent = mgr.spawn("general", "task", None, None, false).await;
        // Give the executor a moment to actually be suspended in the LLM call
        // before cancelling, so this exercises the select! race rather than
        // the pre-loop check.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(mgr.cancel(&agent.id).await);

        let result = mgr.wait(&agent.id).await;
        assert!(result.is_some(), "a cancelled agent must still produce a recorded result");
        assert_eq!(agent.state(), AgentState::Cancelled);
        assert_eq!(result.unwrap().error.as_deref(), Some("cancelled"));
    }
}
