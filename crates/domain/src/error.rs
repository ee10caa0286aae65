//! Domain error types.

use common::OrderId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status transition is not allowed.
    #[error("Invalid order status transition for {order_id}: {from} -> {to}")]
    InvalidStatusTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
