//! Tool subsystem errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("argument {name} has wrong type: expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("argument {name} is not one of the allowed values")]
    InvalidEnum { name: String },

    #[error("argument {name} is out of range")]
    OutOfRange { name: String },

    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),
}

impl ToolError {
    pub fn name(&self) -> Option<&str> {
        match self {
            ToolError::MissingArgument(n)
            | ToolError::TypeMismatch { name: n, .. }
            | ToolError::InvalidEnum { name: n }
            | ToolError::OutOfRange { name: n } => Some(n),
            _ => None,
        }
    }
}
