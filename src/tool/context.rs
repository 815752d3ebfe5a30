//! Execution context passed fresh to every tool call (spec §3).

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Default per-call timeout applied by the tool executor when a context
/// doesn't specify one.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Context for one tool invocation. Created fresh per call; never mutated
/// by the tool body itself (spec §3).
#[derive(Clone)]
pub struct ExecutionContext {
    pub working_dir: PathBuf,
    pub session_id: String,
    pub agent_id: String,
    pub dry_run: bool,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub metadata: HashMap<String, Value>,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(working_dir: PathBuf, session_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            working_dir,
            session_id: session_id.into(),
            agent_id: agent_id.into(),
            dry_run: false,
            timeout: DEFAULT_TOOL_TIMEOUT,
            max_output_bytes: 30_000,
            metadata: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
