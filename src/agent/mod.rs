//! Agent model, executor, and scheduler (spec §4.3, §4.4).

pub mod error;
pub mod executor;
pub mod manager;
pub mod model;
pub mod types;

pub use error::AgentError;
pub use executor::AgentExecutor;
pub use manager::{AgentManager, ManagerStats};
pub use model::{
    Agent, AgentConfig, AgentContext, AgentResult, AgentState, AggregatedResult, ResourceLimits, ResourceUsage,
};
pub use types::{AgentTypeDefinition, AgentTypeRegistry};
