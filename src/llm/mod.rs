//! LLM capability boundary (spec §6): the one trait the execution core
//! consumes and never implements. Providers, HTTP transport, retries, and
//! model registries live outside this crate.

mod error;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use types::{Message, MessageRole, ToolCall, ToolDefinition, Usage};

use async_trait::async_trait;
use std::sync::Arc;

/// A single asynchronous completion operation (spec §6). `content` and
/// `tool_calls` are mutually present-or-absent modes: content-only means the
/// turn is final, tool-calls means the agent loop should dispatch them and
/// continue.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<LlmResponse, LlmError>;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<LlmResponse, LlmError> {
        (**self).complete(messages, tools, model).await
    }
}
