use thiserror::Error;

use crate::models::workflow::ExecutionStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("execution is {0}, artifacts can only be recorded while running")]
    NotRunning(ExecutionStatus),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("unknown resource category: {0}")]
    UnknownCategory(String),

    #[error("config error: {0}")]
    Config(String),
}
