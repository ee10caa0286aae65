//! Shared identifier types used across the order-processing saga workspace.

pub mod types;

pub use types::{OrderId, SagaId};
