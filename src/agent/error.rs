//! Agent-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("Resource limit exceeded: {0}")]
    LimitExceeded(&'static str),
}
