//! Saga step lifecycle.

use serde::{Deserialize, Serialize};

/// The step a saga has most recently completed.
///
/// Forward path:
/// ```text
/// Started ──► StockVerified ──► StockReserved ──► PaymentProcessed
///         ──► NotificationSent ──► Completed
/// ```
/// Compensation path: `Compensating ──► Compensated`.
///
/// `current_step` advances monotonically along the forward path; the only
/// other move is onto the compensation path after a failure.
/// `NotificationSent` is recorded even when the notification call failed:
/// the step is non-critical and counts as attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStep {
    /// Saga created, no external call made yet.
    #[default]
    Started,

    /// Inventory availability confirmed for every line item.
    StockVerified,

    /// Stock reservation obtained (`reservation_id` captured).
    StockReserved,

    /// Payment captured (`payment_id` captured).
    PaymentProcessed,

    /// Order confirmation notification attempted.
    NotificationSent,

    /// Forward path finished.
    Completed,

    /// Reverse actions are being executed.
    Compensating,

    /// Reverse actions finished.
    Compensated,
}

impl SagaStep {
    /// The forward steps that still have to execute after this one.
    pub fn remaining_forward(&self) -> &'static [SagaStep] {
        match self {
            SagaStep::Started => &[
                SagaStep::StockVerified,
                SagaStep::StockReserved,
                SagaStep::PaymentProcessed,
                SagaStep::NotificationSent,
            ],
            SagaStep::StockVerified => &[
                SagaStep::StockReserved,
                SagaStep::PaymentProcessed,
                SagaStep::NotificationSent,
            ],
            SagaStep::StockReserved => &[SagaStep::PaymentProcessed, SagaStep::NotificationSent],
            SagaStep::PaymentProcessed => &[SagaStep::NotificationSent],
            SagaStep::NotificationSent
            | SagaStep::Completed
            | SagaStep::Compensating
            | SagaStep::Compensated => &[],
        }
    }

    /// Returns true if this step is on the compensation path.
    pub fn is_compensation(&self) -> bool {
        matches!(self, SagaStep::Compensating | SagaStep::Compensated)
    }

    /// Returns the step name as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::Started => "STARTED",
            SagaStep::StockVerified => "STOCK_VERIFIED",
            SagaStep::StockReserved => "STOCK_RESERVED",
            SagaStep::PaymentProcessed => "PAYMENT_PROCESSED",
            SagaStep::NotificationSent => "NOTIFICATION_SENT",
            SagaStep::Completed => "COMPLETED",
            SagaStep::Compensating => "COMPENSATING",
            SagaStep::Compensated => "COMPENSATED",
        }
    }

    /// Parses a persisted step name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STARTED" => Some(SagaStep::Started),
            "STOCK_VERIFIED" => Some(SagaStep::StockVerified),
            "STOCK_RESERVED" => Some(SagaStep::StockReserved),
            "PAYMENT_PROCESSED" => Some(SagaStep::PaymentProcessed),
            "NOTIFICATION_SENT" => Some(SagaStep::NotificationSent),
            "COMPLETED" => Some(SagaStep::Completed),
            "COMPENSATING" => Some(SagaStep::Compensating),
            "COMPENSATED" => Some(SagaStep::Compensated),
            _ => None,
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_path_from_start() {
        assert_eq!(
            SagaStep::Started.remaining_forward(),
            &[
                SagaStep::StockVerified,
                SagaStep::StockReserved,
                SagaStep::PaymentProcessed,
                SagaStep::NotificationSent,
            ]
        );
    }

    #[test]
    fn test_resumption_skips_completed_steps() {
        assert_eq!(
            SagaStep::StockReserved.remaining_forward(),
            &[SagaStep::PaymentProcessed, SagaStep::NotificationSent]
        );
        assert_eq!(
            SagaStep::PaymentProcessed.remaining_forward(),
            &[SagaStep::NotificationSent]
        );
    }

    #[test]
    fn test_no_forward_steps_after_notification() {
        assert!(SagaStep::NotificationSent.remaining_forward().is_empty());
        assert!(SagaStep::Completed.remaining_forward().is_empty());
        assert!(SagaStep::Compensating.remaining_forward().is_empty());
    }

    #[test]
    fn test_compensation_steps() {
        assert!(SagaStep::Compensating.is_compensation());
        assert!(SagaStep::Compensated.is_compensation());
        assert!(!SagaStep::PaymentProcessed.is_compensation());
    }

    #[test]
    fn test_parse_roundtrip() {
        for step in [
            SagaStep::Started,
            SagaStep::StockVerified,
            SagaStep::StockReserved,
            SagaStep::PaymentProcessed,
            SagaStep::NotificationSent,
            SagaStep::Completed,
            SagaStep::Compensating,
            SagaStep::Compensated,
        ] {
            assert_eq!(SagaStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(SagaStep::parse("bogus"), None);
    }
}
