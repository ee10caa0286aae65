//! Saga state store for the order-processing saga.
//!
//! The store holds one durable [`SagaState`] record per saga run and is the
//! single source of truth for resumability: the orchestrator persists a new
//! record after every step, and a crashed saga is resumed from whatever the
//! store last saw.
//!
//! Two implementations are provided:
//! - [`InMemorySagaStore`] for tests
//! - [`PostgresSagaStore`] backed by sqlx

pub mod error;
pub mod memory;
pub mod postgres;
pub mod state;
pub mod status;
pub mod step;
pub mod store;

pub use common::{OrderId, SagaId};
pub use error::{Result, SagaStoreError};
pub use memory::InMemorySagaStore;
pub use postgres::PostgresSagaStore;
pub use state::{ErrorDetails, LineItem, SagaState, StateData, SAGA_TYPE_ORDER_PROCESSING};
pub use status::SagaStatus;
pub use step::SagaStep;
pub use store::SagaStore;
