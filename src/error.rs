//! Error types for the event core.

use crate::config::ConfigurationError;
use crate::expression::ExpressionError;
use crate::messaging::MessagingError;
use crate::models::ActionKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskerError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Expression error: {0}")]
    ExpressionError(#[from] ExpressionError),

    #[error("Messaging error: {0}")]
    MessagingError(#[from] MessagingError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Action not supported: {0}")]
    UnsupportedAction(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn unsupported(kind: ActionKind) -> Self {
        Self::UnsupportedAction(kind.to_string())
    }

    /// Whether the failure came from the backing store rather than the input
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::DatabaseError(_))
    }
}

impl From<sqlx::Error> for TaskerError {
    fn from(err: sqlx::Error) -> Self {
        TaskerError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for TaskerError {
    fn from(error: serde_json::Error) -> Self {
        TaskerError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, TaskerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TaskerError::validation("workflowName is empty");
        assert_eq!(err.to_string(), "Validation error: workflowName is empty");

        let err = TaskerError::unsupported(ActionKind::StartWorkflow);
        assert_eq!(err.to_string(), "Action not supported: start_workflow");
    }

    #[test]
    fn test_sqlx_conversion_is_store_failure() {
        let err: TaskerError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_store_failure());
        assert!(!TaskerError::validation("x").is_store_failure());
    }
}
