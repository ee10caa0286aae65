//! The order record and its status state machine.

use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::value_objects::{Money, OrderItem, UserId};

/// The status of an order as observed by order-facing callers.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been placed and is awaiting processing.
    #[default]
    Pending,

    /// Stock committed and payment captured (terminal state).
    Confirmed,

    /// Order was rolled back (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the order can be confirmed from this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Cancelled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An order record.
///
/// This is the aggregate the saga drives: the orchestrator reads it to seed
/// saga state and writes back only the final status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// The order identifier.
    pub id: OrderId,

    /// The user who placed the order.
    pub user_id: UserId,

    /// Line items.
    pub items: Vec<OrderItem>,

    /// ISO 4217 currency code for the order total.
    pub currency: String,

    /// Current status.
    pub status: OrderStatus,
}

impl Order {
    /// Creates a new pending order with no items.
    pub fn new(user_id: UserId, currency: impl Into<String>) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            items: Vec::new(),
            currency: currency.into(),
            status: OrderStatus::Pending,
        }
    }

    /// Adds a line item to the order.
    pub fn add_item(&mut self, item: OrderItem) {
        self.items.push(item);
    }

    /// Returns true if the order has at least one item.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns the order total (sum of line item totals).
    pub fn total_amount(&self) -> Money {
        self.items
            .iter()
            .fold(Money::zero(), |acc, item| acc + item.total_price())
    }
}
