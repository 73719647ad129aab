//! Domain errors for the Cadence task engine.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the Cadence system.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No task with this id.
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    /// The task state machine does not allow the change.
    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition { from: String, to: String, reason: String },

    /// Input rejected before touching any state.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Storage failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The execution backend could not be used.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl DomainError {
    /// Whether the error was caused by the caller (bad input or a state machine
    /// violation) rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound(_) | Self::InvalidStateTransition { .. } | Self::ValidationFailed(_)
        )
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
