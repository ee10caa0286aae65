//! Notification service port and in-memory implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use common::OrderId;
use domain::UserId;
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};

/// Result of a notification attempt.
#[derive(Debug, Clone)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
}

/// Port for the notification dependency.
///
/// This is the saga's only non-critical dependency: the orchestrator
/// records a failed send and moves on instead of compensating.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends the order confirmation to the user who placed the order.
    async fn send_order_confirmation(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<NotificationResult>;
}

/// In-memory notification service for testing, with fault injection.
#[derive(Clone, Default)]
pub struct InMemoryNotificationService {
    /// Sent confirmations as (order_id, message_id).
    sent: Arc<RwLock<Vec<(OrderId, String)>>>,
    /// When set, every send is rejected (non-retriable).
    reject_all: Arc<AtomicBool>,
    /// Remaining sends that fail transiently before the service recovers.
    transient_failures: Arc<AtomicU32>,
    next_message: Arc<AtomicU64>,
}

impl InMemoryNotificationService {
    /// Creates a new in-memory notification service that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every send until cleared.
    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Makes the next `count` sends fail with a transient error.
    pub fn fail_transiently(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Returns the number of confirmations sent.
    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send_order_confirmation(
        &self,
        order_id: OrderId,
        _user_id: UserId,
    ) -> Result<NotificationResult> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SagaError::ServiceUnavailable {
                service: "notification",
                reason: "injected transient failure".to_string(),
            });
        }
        if self.reject_all.load(Ordering::SeqCst) {
            return Err(SagaError::NotificationRejected(
                "injected rejection".to_string(),
            ));
        }

        let message_id = format!(
            "MSG-{:04}",
            self.next_message.fetch_add(1, Ordering::SeqCst) + 1
        );
        self.sent.write().await.push((order_id, message_id.clone()));

        Ok(NotificationResult {
            success: true,
            message_id: Some(message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_send() {
        let service = InMemoryNotificationService::new();
        let result = service
            .send_order_confirmation(OrderId::new(), UserId::new())
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.message_id.unwrap().starts_with("MSG-"));
        assert_eq!(service.sent_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejection_is_non_retriable() {
        let service = InMemoryNotificationService::new();
        service.set_reject_all(true);

        let result = service
            .send_order_confirmation(OrderId::new(), UserId::new())
            .await;
        assert!(matches!(result, Err(SagaError::NotificationRejected(_))));
        assert_eq!(service.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_transient_failure_budget_recovers() {
        let service = InMemoryNotificationService::new();
        service.fail_transiently(1);

        let order_id = OrderId::new();
        let user_id = UserId::new();
        assert!(
            service
                .send_order_confirmation(order_id, user_id)
                .await
                .is_err()
        );
        assert!(
            service
                .send_order_confirmation(order_id, user_id)
                .await
                .is_ok()
        );
    }
}
