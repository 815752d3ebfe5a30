//! Command dispatcher errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("Unknown command: /{0}")]
    Unknown(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("{0}")]
    ExecutionFailed(String),
}
