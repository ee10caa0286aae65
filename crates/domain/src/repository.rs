//! Order repository port and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::{DomainError, Result};
use crate::order::{Order, OrderStatus};

/// Port for loading orders and recording the saga's final status transition.
///
/// Implementations must be thread-safe (Send + Sync): many sagas for
/// different orders run concurrently against the same repository.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Finds an order by ID. Returns None if it does not exist.
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Transitions an order to a new status.
    ///
    /// Fails with `InvalidStatusTransition` if the order's current status
    /// does not allow the transition, and `OrderNotFound` if the order
    /// does not exist.
    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()>;
}

/// In-memory order repository for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an order, replacing any existing record with the same ID.
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(DomainError::OrderNotFound(order_id))?;

        let allowed = match status {
            OrderStatus::Confirmed => order.status.can_confirm(),
            OrderStatus::Cancelled => order.status.can_cancel(),
            OrderStatus::Pending => false,
        };
        if !allowed {
            return Err(DomainError::InvalidStatusTransition {
                order_id,
                from: order.status,
                to: status,
            });
        }

        order.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::{Money, OrderItem, UserId};

    fn sample_order() -> Order {
        let mut order = Order::new(UserId::new(), "USD");
        order.add_item(OrderItem::new("SKU-001", 1, Money::from_cents(500)));
        order
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = InMemoryOrderRepository::new();
        let order = sample_order();
        let order_id = order.id;

        repo.insert(order.clone()).await;

        let found = repo.find_order(order_id).await.unwrap().unwrap();
        assert_eq!(found, order);
        assert_eq!(repo.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_missing_order_returns_none() {
        let repo = InMemoryOrderRepository::new();
        let result = repo.find_order(OrderId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_confirm_pending_order() {
        let repo = InMemoryOrderRepository::new();
        let order = sample_order();
        let order_id = order.id;
        repo.insert(order).await;

        repo.update_order_status(order_id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let found = repo.find_order(order_id).await.unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_cannot_cancel_confirmed_order() {
        let repo = InMemoryOrderRepository::new();
        let order = sample_order();
        let order_id = order.id;
        repo.insert(order).await;

        repo.update_order_status(order_id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let result = repo
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_missing_order_fails() {
        let repo = InMemoryOrderRepository::new();
        let result = repo
            .update_order_status(OrderId::new(), OrderStatus::Confirmed)
            .await;
        assert!(matches!(result, Err(DomainError::OrderNotFound(_))));
    }
}
