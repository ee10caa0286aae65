use async_trait::async_trait;
use common::SagaId;

use crate::error::Result;
use crate::state::SagaState;

/// Core trait for saga state store implementations.
///
/// The store persists one record per saga run. All implementations must be
/// thread-safe (Send + Sync): sagas for different orders run concurrently.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Persists a brand-new saga state.
    ///
    /// Fails with `DuplicateSaga` if a record with the same ID exists, and
    /// with `ActiveSagaExists` if a non-terminal saga already exists for
    /// the same order — one active saga per order at a time.
    ///
    /// Returns the record as stored.
    async fn create(&self, state: &SagaState) -> Result<SagaState>;

    /// Overwrites an existing saga state record, bumping `updated_at`.
    ///
    /// Fails with `SagaNotFound` if no record with this ID exists.
    /// Returns the record as stored.
    async fn save(&self, state: &SagaState) -> Result<SagaState>;

    /// Loads a saga state by ID. Returns None if it does not exist.
    async fn find_one(&self, saga_id: SagaId) -> Result<Option<SagaState>>;
}
