//! Saga store error types.

use common::{OrderId, SagaId};
use thiserror::Error;

/// Errors that can occur when interacting with the saga state store.
#[derive(Debug, Error)]
pub enum SagaStoreError {
    /// The saga was not found in the store.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// A saga with this ID already exists.
    #[error("Saga already exists: {0}")]
    DuplicateSaga(SagaId),

    /// A non-terminal saga already exists for this order.
    #[error("An active saga already exists for order {0}")]
    ActiveSagaExists(OrderId),

    /// The store is unreachable or refused the operation.
    #[error("Saga store unavailable: {0}")]
    Unavailable(String),

    /// A persisted record could not be interpreted.
    #[error("Invalid saga record: {field} = {value:?}")]
    InvalidRecord { field: &'static str, value: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for saga store operations.
pub type Result<T> = std::result::Result<T, SagaStoreError>;
