//! The order-processing saga orchestrator.
//!
//! Drives the fixed forward sequence
//! `StockVerified -> StockReserved -> PaymentProcessed -> NotificationSent`,
//! persisting state after every step so an interrupted run resumes from its
//! last completed milestone. A critical-step failure flips the run onto the
//! compensation path; business failures resolve into a [`SagaMetrics`]
//! summary, only infrastructure failures propagate as `Err`.

use std::time::Instant;

use common::{OrderId, SagaId};
use domain::{
    DomainError, Money, Order, OrderItem, OrderRepository, OrderStatus, ProductId, UserId,
};
use saga_store::{ErrorDetails, LineItem, SagaState, SagaStatus, SagaStep, SagaStore, StateData};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot};
use crate::compensation::CompensationExecutor;
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::metrics::{SagaMetrics, StepMetric};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::services::{AvailabilityStatus, InventoryService, NotificationService, PaymentService};

/// Warehouse location used for availability checks.
const DEFAULT_LOCATION: &str = "MAIN";
/// Payment method forwarded to the provider.
const PAYMENT_METHOD: &str = "CARD";

/// One entry in the forward step table.
struct StepDef {
    step: SagaStep,
    /// The dependency the step calls, for logs and breaker lookups.
    dependency: &'static str,
    /// Non-critical steps record their failure and let the saga continue.
    critical: bool,
}

/// The forward path, in execution order.
const FORWARD_STEPS: &[StepDef] = &[
    StepDef {
        step: SagaStep::StockVerified,
        dependency: "inventory",
        critical: true,
    },
    StepDef {
        step: SagaStep::StockReserved,
        dependency: "inventory",
        critical: true,
    },
    StepDef {
        step: SagaStep::PaymentProcessed,
        dependency: "payment",
        critical: true,
    },
    StepDef {
        step: SagaStep::NotificationSent,
        dependency: "notification",
        critical: false,
    },
];

/// Point-in-time view of all three dependency breakers.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub inventory: CircuitBreakerSnapshot,
    pub payment: CircuitBreakerSnapshot,
    pub notification: CircuitBreakerSnapshot,
}

/// Saga orchestrator over a state store, the order repository and the three
/// external dependencies.
///
/// Each dependency gets its own circuit breaker; all steps share one retry
/// policy, whose re-attempts are charged against the persisted retry count
/// so the saga-wide budget holds across resumptions. Breaker state is
/// process-local.
pub struct SagaOrchestrator<St, O, I, P, N> {
    store: St,
    orders: O,
    inventory: I,
    payment: P,
    notification: N,
    retry: RetryPolicy,
    inventory_breaker: CircuitBreaker,
    payment_breaker: CircuitBreaker,
    notification_breaker: CircuitBreaker,
}

impl<St, O, I, P, N> SagaOrchestrator<St, O, I, P, N>
where
    St: SagaStore,
    O: OrderRepository,
    I: InventoryService,
    P: PaymentService,
    N: NotificationService,
{
    /// Creates an orchestrator with default retry and breaker settings.
    pub fn new(store: St, orders: O, inventory: I, payment: P, notification: N) -> Self {
        Self::with_config(store, orders, inventory, payment, notification, SagaConfig::default())
    }

    /// Creates an orchestrator with explicit configuration.
    pub fn with_config(
        store: St,
        orders: O,
        inventory: I,
        payment: P,
        notification: N,
        config: SagaConfig,
    ) -> Self {
        Self {
            store,
            orders,
            inventory,
            payment,
            notification,
            retry: RetryPolicy::new(config.retry),
            inventory_breaker: CircuitBreaker::new("inventory", config.circuit_breaker.clone()),
            payment_breaker: CircuitBreaker::new("payment", config.circuit_breaker.clone()),
            notification_breaker: CircuitBreaker::new("notification", config.circuit_breaker),
        }
    }

    /// Creates and persists a new saga for a pending order.
    ///
    /// Validates that the order exists, is `Pending` and has line items,
    /// then seeds saga state from the order. The store enforces that at
    /// most one non-terminal saga exists per order.
    #[tracing::instrument(skip(self))]
    pub async fn start_order_processing(&self, order_id: OrderId) -> Result<SagaState> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::Pending {
            return Err(SagaError::OrderNotProcessable(format!(
                "order {} is {}, expected Pending",
                order_id, order.status
            )));
        }
        if !order.has_items() {
            return Err(SagaError::OrderNotProcessable(format!(
                "order {order_id} has no line items"
            )));
        }

        let state = SagaState::new(order_id, Self::seed_state_data(&order));
        let stored = self.store.create(&state).await?;

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(
            saga_id = %stored.id,
            correlation_id = %stored.correlation_id,
            "order-processing saga started"
        );
        Ok(stored)
    }

    /// Executes a saga to a terminal status.
    ///
    /// Safe to call on a saga that was interrupted mid-run: execution picks
    /// up after the last persisted step, and an interrupted compensation is
    /// re-driven to its terminal status. A saga already in a terminal
    /// status returns its recorded outcome without side effects.
    #[tracing::instrument(skip(self))]
    pub async fn execute_saga(&self, saga_id: SagaId) -> Result<SagaMetrics> {
        let run_start = Instant::now();
        let mut state = self
            .store
            .find_one(saga_id)
            .await?
            .ok_or(SagaError::SagaNotFound(saga_id))?;

        if state.is_terminal() {
            return Ok(SagaMetrics {
                saga_id,
                final_status: state.status,
                compensation_executed: matches!(
                    state.status,
                    SagaStatus::Compensated | SagaStatus::Failed
                ),
                step_metrics: Vec::new(),
                duration: run_start.elapsed(),
            });
        }

        metrics::counter!("saga_executions_total").increment(1);

        // An interrupted compensation run is re-driven, not re-executed forward.
        if state.status == SagaStatus::Compensating {
            tracing::info!(correlation_id = %state.correlation_id, "resuming interrupted compensation");
            return self.compensate_and_finish(state, Vec::new(), run_start).await;
        }

        let mut step_metrics = Vec::new();
        let remaining = state.current_step.remaining_forward();

        for def in FORWARD_STEPS.iter().filter(|d| remaining.contains(&d.step)) {
            let step_start = Instant::now();
            let result = self.run_step(&mut state, def.step).await;

            match result {
                Ok(retries) => {
                    state.add_retries(retries);
                    state.advance_to(def.step);
                    state = self.store.save(&state).await?;

                    step_metrics.push(StepMetric {
                        step: def.step,
                        success: true,
                        retry_count: retries,
                        duration: step_start.elapsed(),
                    });
                    metrics::histogram!("saga_step_duration_seconds", "step" => def.step.as_str())
                        .record(step_start.elapsed().as_secs_f64());
                    tracing::info!(
                        step = %def.step,
                        retries,
                        correlation_id = %state.correlation_id,
                        "step completed"
                    );
                }
                Err(failure) => {
                    state.add_retries(failure.retries);
                    step_metrics.push(StepMetric {
                        step: def.step,
                        success: false,
                        retry_count: failure.retries,
                        duration: step_start.elapsed(),
                    });
                    metrics::counter!("saga_step_failures_total", "step" => def.step.as_str())
                        .increment(1);

                    if !def.critical {
                        tracing::warn!(
                            step = %def.step,
                            dependency = def.dependency,
                            error = %failure.error,
                            correlation_id = %state.correlation_id,
                            "non-critical step failed, continuing"
                        );
                        state.advance_to(def.step);
                        state = self.store.save(&state).await?;
                        continue;
                    }

                    tracing::error!(
                        step = %def.step,
                        dependency = def.dependency,
                        error = %failure.error,
                        correlation_id = %state.correlation_id,
                        "critical step failed, compensating"
                    );
                    state.begin_compensation(ErrorDetails {
                        code: failure.error.error_code().to_string(),
                        message: failure.error.to_string(),
                        step: def.step,
                    });
                    state = self.store.save(&state).await?;
                    return self.compensate_and_finish(state, step_metrics, run_start).await;
                }
            }
        }

        let completion_start = Instant::now();
        self.confirm_order(state.state_data.order_id).await?;
        state.mark_completed();
        let state = self.store.save(&state).await?;
        step_metrics.push(StepMetric {
            step: SagaStep::Completed,
            success: true,
            retry_count: 0,
            duration: completion_start.elapsed(),
        });

        metrics::counter!("saga_completed_total").increment(1);
        metrics::histogram!("saga_duration_seconds").record(run_start.elapsed().as_secs_f64());
        tracing::info!(correlation_id = %state.correlation_id, "saga completed");

        Ok(SagaMetrics {
            saga_id,
            final_status: SagaStatus::Completed,
            compensation_executed: false,
            step_metrics,
            duration: run_start.elapsed(),
        })
    }

    /// Snapshots all three dependency breakers for health reporting.
    pub fn circuit_breaker_stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            inventory: self.inventory_breaker.snapshot(),
            payment: self.payment_breaker.snapshot(),
            notification: self.notification_breaker.snapshot(),
        }
    }

    async fn run_step(
        &self,
        state: &mut SagaState,
        step: SagaStep,
    ) -> std::result::Result<u32, RetryFailure> {
        match step {
            SagaStep::StockVerified => self.verify_stock(state).await,
            SagaStep::StockReserved => self.reserve_stock(state).await,
            SagaStep::PaymentProcessed => self.process_payment(state).await,
            SagaStep::NotificationSent => self.send_notification(state).await,
            _ => unreachable!("only forward steps appear in the step table"),
        }
    }

    async fn verify_stock(&self, state: &SagaState) -> std::result::Result<u32, RetryFailure> {
        let items = state.state_data.items.clone();
        let result = self
            .retry
            .execute_with_budget(&self.inventory_breaker, state.retry_count, || {
                let items = items.clone();
                async move {
                    for item in &items {
                        let product_id = ProductId::new(item.product_id.clone());
                        let availability = self
                            .inventory
                            .check_availability(&product_id, item.quantity, DEFAULT_LOCATION)
                            .await?;
                        if availability.status == AvailabilityStatus::OutOfStock {
                            return Err(SagaError::OutOfStock(item.product_id.clone()));
                        }
                    }
                    Ok(())
                }
            })
            .await?;
        Ok(result.retries)
    }

    async fn reserve_stock(
        &self,
        state: &mut SagaState,
    ) -> std::result::Result<u32, RetryFailure> {
        let order_id = state.state_data.order_id;
        let items: Vec<OrderItem> = state
            .state_data
            .items
            .iter()
            .map(|item| {
                OrderItem::new(
                    item.product_id.clone(),
                    item.quantity,
                    Money::from_cents(item.unit_price_cents),
                )
            })
            .collect();

        let result = self
            .retry
            .execute_with_budget(&self.inventory_breaker, state.retry_count, || {
                let items = items.clone();
                async move { self.inventory.reserve_stock(order_id, &items).await }
            })
            .await?;

        state.state_data.reservation_id = Some(result.value.reservation_id);
        Ok(result.retries)
    }

    async fn process_payment(
        &self,
        state: &mut SagaState,
    ) -> std::result::Result<u32, RetryFailure> {
        let order_id = state.state_data.order_id;
        let amount = Money::from_cents(state.state_data.total_cents);
        let currency = state.state_data.currency.clone();
        // Stable across retries and resumptions, so a lost confirmation can
        // never turn into a double charge.
        let idempotency_key = format!("{}:{}", state.id, SagaStep::PaymentProcessed);

        let result = self
            .retry
            .execute_with_budget(&self.payment_breaker, state.retry_count, || {
                let currency = currency.clone();
                let idempotency_key = idempotency_key.clone();
                async move {
                    self.payment
                        .process_payment(order_id, amount, &currency, PAYMENT_METHOD, &idempotency_key)
                        .await
                }
            })
            .await?;

        state.state_data.payment_id = Some(result.value.payment_id);
        Ok(result.retries)
    }

    async fn send_notification(&self, state: &SagaState) -> std::result::Result<u32, RetryFailure> {
        let order_id = state.state_data.order_id;
        let user_id = UserId::from_uuid(state.state_data.user_id);

        let result = self
            .retry
            .execute_with_budget(&self.notification_breaker, state.retry_count, || async move {
                self.notification
                    .send_order_confirmation(order_id, user_id)
                    .await
            })
            .await?;
        Ok(result.retries)
    }

    async fn compensate_and_finish(
        &self,
        mut state: SagaState,
        step_metrics: Vec<StepMetric>,
        run_start: Instant,
    ) -> Result<SagaMetrics> {
        let outcome = CompensationExecutor::new(&self.inventory, &self.payment)
            .compensate(&mut state)
            .await;
        // Persist which actions completed before the terminal transition, so
        // a crash here cannot re-run what is already undone.
        state = self.store.save(&state).await?;

        self.cancel_order(state.state_data.order_id).await?;

        if outcome.fully_compensated() {
            state.mark_compensated();
            metrics::counter!("saga_compensated_total").increment(1);
            tracing::info!(correlation_id = %state.correlation_id, "saga compensated");
        } else {
            state.mark_failed();
            metrics::counter!("saga_failed_total").increment(1);
            tracing::error!(
                correlation_id = %state.correlation_id,
                failed_actions = outcome.failures.len(),
                "compensation incomplete, manual reconciliation needed"
            );
        }
        let state = self.store.save(&state).await?;
        metrics::histogram!("saga_duration_seconds").record(run_start.elapsed().as_secs_f64());

        Ok(SagaMetrics {
            saga_id: state.id,
            final_status: state.status,
            compensation_executed: true,
            step_metrics,
            duration: run_start.elapsed(),
        })
    }

    async fn confirm_order(&self, order_id: OrderId) -> Result<()> {
        match self
            .orders
            .update_order_status(order_id, OrderStatus::Confirmed)
            .await
        {
            Ok(()) => Ok(()),
            // A resumed run may find the order already confirmed.
            Err(DomainError::InvalidStatusTransition {
                from: OrderStatus::Confirmed,
                ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<()> {
        match self
            .orders
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await
        {
            Ok(()) => Ok(()),
            // A resumed compensation may find the order already cancelled.
            Err(DomainError::InvalidStatusTransition {
                from: OrderStatus::Cancelled,
                ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn seed_state_data(order: &Order) -> StateData {
        StateData {
            order_id: order.id,
            user_id: order.user_id.as_uuid(),
            items: order
                .items
                .iter()
                .map(|item| LineItem {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                })
                .collect(),
            total_cents: order.total_amount().cents(),
            currency: order.currency.clone(),
            reservation_id: None,
            payment_id: None,
        }
    }
}
