//! Crate-wide error kinds.
//!
//! Mirrors the error taxonomy tool results and engine events surface to
//! callers. Tool-level failures never propagate as `CoreError` past the
//! coordinator boundary — they are converted to a `ToolResult` first.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt on-disk state: {0}")]
    Corrupt(String),

    #[error("model adapter failure: {0}")]
    ModelFailure(String),

    #[error("cancelled")]
    Cancelled,

    #[error("iteration budget exhausted")]
    BudgetExhausted,

    #[error("io error: {0}")]
    IoError(String),

    #[error("task is busy: {0}")]
    Busy(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Corrupt(e.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
