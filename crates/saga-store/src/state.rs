//! The persisted saga state record.

use chrono::{DateTime, Utc};
use common::{OrderId, SagaId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::SagaStatus;
use crate::step::SagaStep;

/// Saga type tag for the order-processing saga family.
pub const SAGA_TYPE_ORDER_PROCESSING: &str = "ORDER_PROCESSING";

/// A line item captured into saga state.
///
/// Deliberately plain-typed so the store crate carries no domain dependency;
/// the orchestrator maps order items into this shape at saga creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product identifier (SKU).
    pub product_id: String,
    /// Quantity ordered.
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price_cents: i64,
}

/// Everything needed to resume or compensate a saga without re-deriving it.
///
/// Append-only during the happy path: fields are added as steps succeed,
/// never removed. `reservation_id` is present iff a reservation was made and
/// not yet released; `payment_id` iff a payment was captured and not yet
/// refunded — presence of these fields is exactly what the compensation
/// executor keys off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateData {
    /// The order this saga drives.
    pub order_id: OrderId,
    /// The user who placed the order.
    pub user_id: Uuid,
    /// Line items to verify and reserve.
    pub items: Vec<LineItem>,
    /// Order total in cents.
    pub total_cents: i64,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Reservation obtained from inventory, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    /// Payment captured, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

/// Structured error recorded when a saga fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Stable error code (e.g. `OUT_OF_STOCK`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The step at which the error occurred.
    pub step: SagaStep,
}

/// One durable record per order-processing saga run.
///
/// Updated only by the orchestrator; persisted after every step so a crashed
/// run can resume from `current_step` using `state_data` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaState {
    /// Unique saga identifier, immutable after creation.
    pub id: SagaId,
    /// Saga family tag.
    pub saga_type: String,
    /// The order this saga drives (one active saga per order).
    pub aggregate_id: OrderId,
    /// Log-correlation token carried on every external call of this run.
    pub correlation_id: String,
    /// Last completed milestone on the step lifecycle.
    pub current_step: SagaStep,
    /// Lifecycle status.
    pub status: SagaStatus,
    /// Accumulated context for resumption and compensation.
    pub state_data: StateData,
    /// Set only on failure.
    pub error_details: Option<ErrorDetails>,
    /// Cumulative retries across the whole saga, bounded across resumptions.
    pub retry_count: u32,
    /// Set when the saga reaches `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the saga reaches `Compensated` or `Failed`.
    pub failed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last persisted-write timestamp, bumped by the store on save.
    pub updated_at: DateTime<Utc>,
}

impl SagaState {
    /// Creates a new saga state in status `Started` at step `Started`.
    pub fn new(aggregate_id: OrderId, state_data: StateData) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            saga_type: SAGA_TYPE_ORDER_PROCESSING.to_string(),
            aggregate_id,
            correlation_id: format!("{}-{}", aggregate_id, now.timestamp_millis()),
            current_step: SagaStep::Started,
            status: SagaStatus::Started,
            state_data,
            error_details: None,
            retry_count: 0,
            completed_at: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the saga is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Advances to a newly completed forward step.
    pub fn advance_to(&mut self, step: SagaStep) {
        self.current_step = step;
        self.status = SagaStatus::InProgress;
    }

    /// Moves the saga onto the compensation path, recording the error.
    pub fn begin_compensation(&mut self, error: ErrorDetails) {
        self.error_details = Some(error);
        self.current_step = SagaStep::Compensating;
        self.status = SagaStatus::Compensating;
    }

    /// Terminal transition: compensation ran to completion.
    pub fn mark_compensated(&mut self) {
        self.current_step = SagaStep::Compensated;
        self.status = SagaStatus::Compensated;
        self.failed_at = Some(Utc::now());
    }

    /// Terminal transition: compensation could not fully run.
    pub fn mark_failed(&mut self) {
        self.status = SagaStatus::Failed;
        self.failed_at = Some(Utc::now());
    }

    /// Terminal transition: every step succeeded.
    pub fn mark_completed(&mut self) {
        self.current_step = SagaStep::Completed;
        self.status = SagaStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Accumulates retries spent on a step.
    pub fn add_retries(&mut self, retries: u32) {
        self.retry_count += retries;
    }
}
