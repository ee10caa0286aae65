//! Order-processing saga orchestration.
//!
//! This crate coordinates a multi-step order workflow across inventory,
//! payment and notification dependencies:
//! - [`SagaOrchestrator`] drives the forward path and the compensation path
//! - [`RetryPolicy`] retries transient failures with exponential backoff
//! - [`CircuitBreaker`] isolates each failing dependency
//! - [`CompensationExecutor`] undoes completed work after a failure
//!
//! Persistence lives in the `saga-store` crate; every step is persisted so
//! an interrupted saga resumes from its last completed milestone.

pub mod circuit_breaker;
pub mod compensation;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod services;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState};
pub use compensation::{CompensationExecutor, CompensationFailure, CompensationOutcome};
pub use config::{CircuitBreakerConfig, RetryConfig, SagaConfig};
pub use error::{Result, SagaError};
pub use metrics::{SagaMetrics, StepMetric};
pub use orchestrator::{CircuitBreakerStats, SagaOrchestrator};
pub use retry::{Retried, RetryFailure, RetryPolicy};
