//! Per-run execution metrics returned to the caller.
//!
//! These are the caller-facing summary of a run; aggregate counters and
//! histograms are emitted separately through the `metrics` facade.

use std::time::Duration;

use common::SagaId;
use saga_store::{SagaStatus, SagaStep};

/// Outcome of one forward step attempt sequence.
#[derive(Debug, Clone)]
pub struct StepMetric {
    /// The step this metric describes.
    pub step: SagaStep,
    /// Whether the step ultimately succeeded.
    pub success: bool,
    /// Re-attempts spent on this step (0 = first try decided it).
    pub retry_count: u32,
    /// Wall-clock time spent on the step, retries and backoff included.
    pub duration: Duration,
}

/// Summary of a whole saga run.
#[derive(Debug, Clone)]
pub struct SagaMetrics {
    /// The saga this summary describes.
    pub saga_id: SagaId,
    /// Terminal status the run ended in.
    pub final_status: SagaStatus,
    /// Whether the compensation path ran (even if it had nothing to undo).
    pub compensation_executed: bool,
    /// One entry per forward step attempted in this run, in execution order.
    pub step_metrics: Vec<StepMetric>,
    /// Wall-clock time for the whole run.
    pub duration: Duration,
}

impl SagaMetrics {
    /// Looks up the metric for a given step, if it was attempted in this run.
    pub fn step(&self, step: SagaStep) -> Option<&StepMetric> {
        self.step_metrics.iter().find(|m| m.step == step)
    }

    /// Total retries across all steps of this run.
    pub fn total_retries(&self) -> u32 {
        self.step_metrics.iter().map(|m| m.retry_count).sum()
    }
}
