use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("corrupt document {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("execution {id} is terminal and cannot be overwritten")]
    TerminalRecord { id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
