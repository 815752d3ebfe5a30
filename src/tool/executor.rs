//! The uniform executor that sits between callers and tool bodies
//! (spec §4.1): argument validation, the dry-run shortcut, a bounded
//! deadline, and an in-memory execution history.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use super::context::ExecutionContext;
use super::descriptor::{ParamSpec, ParamType, ToolDescriptor};
use super::error::ToolError;
use super::result::ToolResult;
use super::Tool;

/// One completed invocation, kept for observability (spec §4.1 bullet 4).
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub tool_name: String,
    pub args: Value,
    pub session_id: String,
    pub result: ToolResult,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Validate a JSON argument object against a descriptor's parameter specs.
/// Returns the first failure; callers should short-circuit on `Err`.
pub fn validate_args(descriptor: &ToolDescriptor, args: &Value) -> Result<(), ToolError> {
    let obj = args.as_object();

    for param in &descriptor.parameters {
        let value = obj.and_then(|o| o.get(&param.name));
        match value {
            None => {
                if param.required && param.default.is_none() {
                    return Err(ToolError::MissingArgument(param.name.clone()));
                }
            }
            Some(v) => validate_one(param, v)?,
        }
    }
    Ok(())
}

fn validate_one(param: &ParamSpec, value: &Value) -> Result<(), ToolError> {
    let expected = match param.param_type {
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Number => "number",
        ParamType::Boolean => "boolean",
        ParamType::Array => "array",
        ParamType::Object => "object",
    };
    let type_ok = match param.param_type {
        ParamType::String => value.is_string(),
        // integer excludes booleans explicitly (spec §4.1)
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Number => value.is_number(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
    };
    if !type_ok {
        return Err(ToolError::TypeMismatch {
            name: param.name.clone(),
            expected,
        });
    }

    if let Some(allowed) = &param.enum_values {
        if !allowed.contains(value) {
            return Err(ToolError::InvalidEnum {
                name: param.name.clone(),
            });
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = param.minimum {
            if n < min {
                return Err(ToolError::OutOfRange {
                    name: param.name.clone(),
                });
            }
        }
        if let Some(max) = param.maximum {
            if n > max {
                return Err(ToolError::OutOfRange {
                    name: param.name.clone(),
                });
            }
        }
    }

    if let Some(s) = value.as_str() {
        let len = s.chars().count();
        if let Some(min_len) = param.min_length {
            if len < min_len {
                return Err(ToolError::OutOfRange {
                    name: param.name.clone(),
                });
            }
        }
        if let Some(max_len) = param.max_length {
            if len > max_len {
                return Err(ToolError::OutOfRange {
                    name: param.name.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Applies validation, the dry-run shortcut, and a timeout around a tool
/// body's `run`, and appends a bounded execution record.
pub struct ToolExecutor {
    history: RwLock<Vec<ToolExecution>>,
    max_history: usize,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(500)
    }
}

impl ToolExecutor {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: RwLock::new(Vec::new()),
            max_history,
        }
    }

    /// Execute a tool under the context's timeout, recording validation
    /// failures, dry-run previews, and exceptions all as `ToolResult`s —
    /// never as an escaped error (spec §7 "errors are values").
    pub async fn execute(&self, tool: Arc<dyn Tool>, ctx: ExecutionContext, args: Value) -> ToolResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let descriptor = tool.descriptor();
        let result = if let Err(e) = validate_args(&descriptor, &args) {
            ToolResult::error(e.to_string())
        } else {
            self.run_bounded(tool, ctx.clone(), args.clone(), ctx.timeout).await
        };

        let record = ToolExecution {
            tool_name: descriptor.name.clone(),
            args,
            session_id: ctx.session_id.clone(),
            result: result.clone(),
            started_at,
            completed_at: started_at + chrono::Duration::from_std(start.elapsed()).unwrap_or_default(),
        };
        self.push_history(record).await;

        result
    }

    async fn run_bounded(
        &self,
        tool: Arc<dyn Tool>,
        ctx: ExecutionContext,
        args: Value,
        timeout: Duration,
    ) -> ToolResult {
        // Dry-run shortcut: the tool body itself decides what "no effect"
        // means (spec §4.1 step 2); we just forward the flag via ctx.
        match tokio::time::timeout(timeout, tool.run(ctx, args)).await {
            Ok(result) => result,
            Err(_) => ToolResult::error(format!("timed out after {}ms", timeout.as_millis()))
                .with_metadata("timeout_ms", serde_json::json!(timeout.as_millis())),
        }
    }

    async fn push_history(&self, record: ToolExecution) {
        let mut history = self.history.write().await;
        history.push(record);
        let len = history.len();
        if len > self.max_history {
            history.drain(0..len - self.max_history);
        }
    }

    pub async fn recent(&self, n: usize) -> Vec<ToolExecution> {
        let history = self.history.read().await;
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::descriptor::ToolCategory;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("echo", "echoes", ToolCategory::Other).with_params(vec![
                ParamSpec::new("text", ParamType::String, "text").required(),
            ])
        }

        async fn run(&self, _ctx: ExecutionContext, args: Value) -> ToolResult {
            ToolResult::ok(args["text"].as_str().unwrap_or_default())
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("slow", "sleeps", ToolCategory::Other)
        }

        async fn run(&self, _ctx: ExecutionContext, _args: Value) -> ToolResult {
            tokio::time::sleep(Duration::from_secs(10)).await;
            ToolResult::ok("done")
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(std::env::temp_dir(), "sess", "agent")
    }

    #[tokio::test]
    async fn missing_required_argument_short_circuits() {
        let executor = ToolExecutor::default();
        let result = executor.execute(Arc::new(Echo), ctx(), json!({})).await;
        assert!(!result.ok);
        assert!(result.output.contains("missing required argument"));
    }

    #[tokio::test]
    async fn successful_call_is_recorded() {
        let executor = ToolExecutor::default();
        executor
            .execute(Arc::new(Echo), ctx(), json!({"text": "hi"}))
            .await;
        let recent = executor.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tool_name, "echo");
    }

    #[tokio::test]
    async fn deadline_exceeded_yields_timeout_error() {
        let executor = ToolExecutor::default();
        let result = executor
            .execute(
                Arc::new(Slow),
                ctx().with_timeout(Duration::from_millis(20)),
                json!({}),
            )
            .await;
        assert!(!result.ok);
        assert!(result.output.contains("timed out after"));
    }
}
