use crate::models::QuestionFilter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No question matches the current filter ({filter}). Try relaxing it.")]
    EmptyPoolError { filter: QuestionFilter },

    #[error("Storage operation failed: {0}")]
    PersistenceError(String),

    #[error("Unknown quiz item: {0}")]
    UnknownItem(i64),

    #[error("Failed to (de)serialize stored record: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
