//! Shell manager errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Shell not found: {0}")]
    NotFound(String),

    #[error("failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Invalid filter regex: {0}")]
    InvalidFilter(String),
}
