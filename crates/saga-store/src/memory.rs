use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::SagaId;
use tokio::sync::RwLock;

use crate::error::{Result, SagaStoreError};
use crate::state::SagaState;
use crate::store::SagaStore;

/// In-memory saga store implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// write-failure injection for exercising the orchestrator's
/// infrastructure-error path.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    states: Arc<RwLock<HashMap<SagaId, SagaState>>>,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory saga store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every subsequent write.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of saga records stored.
    pub async fn saga_count(&self) -> usize {
        self.states.read().await.len()
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(SagaStoreError::Unavailable(
                "saga store write failure injected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create(&self, state: &SagaState) -> Result<SagaState> {
        self.check_available()?;
        let mut states = self.states.write().await;

        if states.contains_key(&state.id) {
            return Err(SagaStoreError::DuplicateSaga(state.id));
        }
        if states
            .values()
            .any(|s| s.aggregate_id == state.aggregate_id && !s.is_terminal())
        {
            return Err(SagaStoreError::ActiveSagaExists(state.aggregate_id));
        }

        let mut stored = state.clone();
        stored.updated_at = Utc::now();
        states.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save(&self, state: &SagaState) -> Result<SagaState> {
        self.check_available()?;
        let mut states = self.states.write().await;

        if !states.contains_key(&state.id) {
            return Err(SagaStoreError::SagaNotFound(state.id));
        }

        let mut stored = state.clone();
        stored.updated_at = Utc::now();
        states.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_one(&self, saga_id: SagaId) -> Result<Option<SagaState>> {
        Ok(self.states.read().await.get(&saga_id).cloned())
    }
}
