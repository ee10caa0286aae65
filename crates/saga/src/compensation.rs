//! Compensation executor: undoes completed work after a forward failure.

use domain::Money;
use saga_store::SagaState;

use crate::error::SagaError;
use crate::services::{InventoryService, PaymentService};

const COMPENSATION_REASON: &str = "saga compensation";

/// One compensating action that did not complete.
#[derive(Debug)]
pub struct CompensationFailure {
    /// The action that failed (`refund_payment` or `release_reservation`).
    pub action: &'static str,
    pub error: SagaError,
}

/// Report of a compensation run.
#[derive(Debug, Default)]
pub struct CompensationOutcome {
    pub failures: Vec<CompensationFailure>,
}

impl CompensationOutcome {
    /// Returns true if every required compensating action completed.
    pub fn fully_compensated(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs compensating actions against the saga's recorded state.
///
/// Which actions run is decided purely by what `state_data` holds: a
/// `payment_id` means a refund is owed, a `reservation_id` means a release
/// is owed. Actions run in reverse chronological order (refund before
/// release) and are best-effort: a failed refund does not stop the release
/// from being attempted. Each completed action clears its ID from
/// `state_data`, so re-running compensation skips what is already undone.
pub struct CompensationExecutor<'a, I, P> {
    inventory: &'a I,
    payment: &'a P,
}

impl<'a, I, P> CompensationExecutor<'a, I, P>
where
    I: InventoryService,
    P: PaymentService,
{
    /// Creates an executor over the two compensatable dependencies.
    pub fn new(inventory: &'a I, payment: &'a P) -> Self {
        Self { inventory, payment }
    }

    /// Executes every owed compensating action, collecting failures.
    #[tracing::instrument(skip(self, state), fields(saga_id = %state.id))]
    pub async fn compensate(&self, state: &mut SagaState) -> CompensationOutcome {
        let mut outcome = CompensationOutcome::default();

        if let Some(payment_id) = state.state_data.payment_id.clone() {
            let amount = Money::from_cents(state.state_data.total_cents);
            match self
                .payment
                .refund_payment(&payment_id, amount, COMPENSATION_REASON)
                .await
            {
                Ok(refund) => {
                    tracing::info!(%payment_id, refund_id = %refund.refund_id, "payment refunded");
                    state.state_data.payment_id = None;
                }
                Err(error) => {
                    tracing::error!(%payment_id, %error, "refund failed during compensation");
                    outcome.failures.push(CompensationFailure {
                        action: "refund_payment",
                        error,
                    });
                }
            }
        }

        if let Some(reservation_id) = state.state_data.reservation_id.clone() {
            match self
                .inventory
                .release_reservation(&reservation_id, COMPENSATION_REASON)
                .await
            {
                Ok(()) => {
                    tracing::info!(%reservation_id, "reservation released");
                    state.state_data.reservation_id = None;
                }
                Err(error) => {
                    tracing::error!(%reservation_id, %error, "release failed during compensation");
                    outcome.failures.push(CompensationFailure {
                        action: "release_reservation",
                        error,
                    });
                }
            }
        }

        metrics::counter!("saga_compensations_total").increment(1);
        if !outcome.fully_compensated() {
            metrics::counter!("saga_compensation_failures_total")
                .increment(outcome.failures.len() as u64);
        }

        outcome
    }
}
