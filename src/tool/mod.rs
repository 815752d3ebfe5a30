//! Tool contract and executor (spec §4.1).
//!
//! Every tool is a descriptor plus one async operation. Polymorphism
//! between tool bodies reduces to dispatching on the descriptor rather than
//! on an inheritance hierarchy — there is no `ExploreTool`/`BashTool` base
//! class, just values implementing `Tool`.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod result;

pub use context::ExecutionContext;
pub use descriptor::{ParamSpec, ParamType, ToolCategory, ToolDescriptor};
pub use error::ToolError;
pub use executor::{ToolExecution, ToolExecutor};
pub use registry::ToolRegistry;
pub use result::ToolResult;

use async_trait::async_trait;
use serde_json::Value;

/// A named, parametrized, LLM-invokable operation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The immutable descriptor: name, description, category, parameters.
    fn descriptor(&self) -> ToolDescriptor;

    /// Execute with a fresh context and the caller-supplied, already
    /// descriptor-validated arguments.
    async fn run(&self, ctx: ExecutionContext, args: Value) -> ToolResult;
}
