//! Saga error taxonomy.
//!
//! Step failures are classified along two axes:
//! - retriable vs. non-retriable, which the retry policy consults per attempt
//! - business vs. infrastructure, which decides whether a failure resolves
//!   into a compensated saga or propagates to the caller as `Err`

use common::{OrderId, SagaId};
use domain::DomainError;
use saga_store::SagaStoreError;
use thiserror::Error;

/// Errors produced while starting or executing a saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A dependency is temporarily unreachable or overloaded (retriable).
    #[error("{service} service unavailable: {reason}")]
    ServiceUnavailable {
        service: &'static str,
        reason: String,
    },

    /// A dependency call exceeded its deadline (retriable).
    #[error("{service} call timed out")]
    Timeout { service: &'static str },

    /// Inventory definitively reported insufficient stock.
    #[error("Insufficient stock for product {0}")]
    OutOfStock(String),

    /// The payment provider definitively declined the charge.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// The payment provider flagged the charge as fraudulent.
    #[error("Payment rejected as fraudulent: {0}")]
    FraudDetected(String),

    /// The notification provider rejected the message.
    #[error("Notification rejected: {0}")]
    NotificationRejected(String),

    /// The circuit breaker for a dependency is open; the call was not made.
    #[error("Circuit breaker open for {dependency}")]
    CircuitOpen { dependency: &'static str },

    /// A retriable error persisted through the whole retry budget.
    #[error("Giving up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SagaError>,
    },

    /// No saga with this ID exists.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// No order with this ID exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order cannot be processed in its current shape.
    #[error("Order not processable: {0}")]
    OrderNotProcessable(String),

    /// The saga state store failed (infrastructure).
    #[error("Saga store error: {0}")]
    Store(#[from] SagaStoreError),

    /// An order domain operation failed (infrastructure).
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SagaError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// Only transient dependency faults qualify; definitive business answers
    /// (out of stock, declined, fraud) never change on retry, and an open
    /// breaker means retries are exactly what must stop.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SagaError::ServiceUnavailable { .. } | SagaError::Timeout { .. }
        )
    }

    /// Stable error code recorded into the saga's `error_details`.
    ///
    /// `RetriesExhausted` reports the code of the underlying error so the
    /// record says what actually went wrong, not that retries ran out.
    pub fn error_code(&self) -> &'static str {
        match self {
            SagaError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            SagaError::Timeout { .. } => "TIMEOUT",
            SagaError::OutOfStock(_) => "OUT_OF_STOCK",
            SagaError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            SagaError::FraudDetected(_) => "FRAUD_DETECTED",
            SagaError::NotificationRejected(_) => "NOTIFICATION_REJECTED",
            SagaError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            SagaError::RetriesExhausted { source, .. } => source.error_code(),
            SagaError::SagaNotFound(_) => "SAGA_NOT_FOUND",
            SagaError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            SagaError::OrderNotProcessable(_) => "ORDER_NOT_PROCESSABLE",
            SagaError::Store(_) => "STORE_ERROR",
            SagaError::Domain(_) => "DOMAIN_ERROR",
        }
    }
}

/// Result type for saga operations.
pub type Result<T> = std::result::Result<T, SagaError>;
