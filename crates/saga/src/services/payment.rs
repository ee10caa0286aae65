//! Payment service port and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use common::OrderId;
use domain::Money;
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub payment_id: String,
    /// Always `CAPTURED` for a successful charge; declines are errors.
    pub status: String,
}

/// Result of a successful refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    pub refund_id: String,
}

/// Port for the payment dependency.
///
/// `process_payment` must be idempotent on `idempotency_key`: charging
/// twice with the same key returns the original result without capturing a
/// second payment. The orchestrator relies on this when a saga resumes past
/// a charge whose confirmation was lost.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the given amount for an order.
    async fn process_payment(
        &self,
        order_id: OrderId,
        amount: Money,
        currency: &str,
        method: &str,
        idempotency_key: &str,
    ) -> Result<PaymentResult>;

    /// Refunds a previously captured payment in full.
    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Money,
        reason: &str,
    ) -> Result<RefundResult>;
}

/// In-memory payment service for testing, with fault injection.
#[derive(Clone, Default)]
pub struct InMemoryPaymentService {
    /// Captured results by idempotency key.
    by_key: Arc<RwLock<HashMap<String, PaymentResult>>>,
    /// Outstanding (not yet refunded) payments by ID, amount in cents.
    captured: Arc<RwLock<HashMap<String, i64>>>,
    /// Refunds recorded as (payment_id, cents, reason).
    refunds: Arc<RwLock<Vec<(String, i64, String)>>>,
    /// When set, the next charge is declined.
    decline_next: Arc<AtomicBool>,
    /// When set, the next charge is rejected as fraudulent.
    fraud_next: Arc<AtomicBool>,
    /// Remaining calls that fail transiently before the service recovers.
    transient_failures: Arc<AtomicU32>,
    /// When set, every call fails transiently.
    fail_all: Arc<AtomicBool>,
    next_payment: Arc<AtomicU64>,
    next_refund: Arc<AtomicU64>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service that accepts every charge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines the next charge attempt.
    pub fn decline_next(&self) {
        self.decline_next.store(true, Ordering::SeqCst);
    }

    /// Rejects the next charge attempt as fraudulent.
    pub fn flag_fraud_next(&self) {
        self.fraud_next.store(true, Ordering::SeqCst);
    }

    /// Makes the next `count` calls fail with a transient error.
    pub fn fail_transiently(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every call fail transiently until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_all.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of captured, not-yet-refunded payments.
    pub async fn outstanding_payment_count(&self) -> usize {
        self.captured.read().await.len()
    }

    /// Returns recorded refunds as (payment_id, cents, reason).
    pub async fn refunds(&self) -> Vec<(String, i64, String)> {
        self.refunds.read().await.clone()
    }

    fn check_transient_failure(&self, call: &'static str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SagaError::ServiceUnavailable {
                service: "payment",
                reason: format!("{call}: injected outage"),
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SagaError::ServiceUnavailable {
                service: "payment",
                reason: format!("{call}: injected transient failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn process_payment(
        &self,
        _order_id: OrderId,
        amount: Money,
        _currency: &str,
        _method: &str,
        idempotency_key: &str,
    ) -> Result<PaymentResult> {
        self.check_transient_failure("process_payment")?;

        // Idempotent replay: same key returns the original capture.
        if let Some(existing) = self.by_key.read().await.get(idempotency_key) {
            return Ok(existing.clone());
        }

        if self.fraud_next.swap(false, Ordering::SeqCst) {
            return Err(SagaError::FraudDetected(
                "charge flagged by risk rules".to_string(),
            ));
        }
        if self.decline_next.swap(false, Ordering::SeqCst) {
            return Err(SagaError::PaymentDeclined(
                "insufficient funds".to_string(),
            ));
        }

        let payment_id = format!(
            "PAY-{:04}",
            self.next_payment.fetch_add(1, Ordering::SeqCst) + 1
        );
        let result = PaymentResult {
            payment_id: payment_id.clone(),
            status: "CAPTURED".to_string(),
        };

        self.captured.write().await.insert(payment_id, amount.cents());
        self.by_key
            .write()
            .await
            .insert(idempotency_key.to_string(), result.clone());

        Ok(result)
    }

    async fn refund_payment(
        &self,
        payment_id: &str,
        amount: Money,
        reason: &str,
    ) -> Result<RefundResult> {
        self.check_transient_failure("refund_payment")?;

        self.captured.write().await.remove(payment_id);
        self.refunds.write().await.push((
            payment_id.to_string(),
            amount.cents(),
            reason.to_string(),
        ));

        Ok(RefundResult {
            refund_id: format!(
                "REF-{:04}",
                self.next_refund.fetch_add(1, Ordering::SeqCst) + 1
            ),
        })
    }
}
