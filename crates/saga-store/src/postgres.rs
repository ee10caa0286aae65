use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, SagaId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, SagaStoreError};
use crate::state::{ErrorDetails, SagaState, StateData};
use crate::status::SagaStatus;
use crate::step::SagaStep;
use crate::store::SagaStore;

/// PostgreSQL-backed saga state store.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_state(row: PgRow) -> Result<SagaState> {
        let status_str: String = row.try_get("status")?;
        let status = SagaStatus::parse(&status_str).ok_or(SagaStoreError::InvalidRecord {
            field: "status",
            value: status_str,
        })?;

        let step_str: String = row.try_get("current_step")?;
        let current_step = SagaStep::parse(&step_str).ok_or(SagaStoreError::InvalidRecord {
            field: "current_step",
            value: step_str,
        })?;

        let state_data: StateData = serde_json::from_value(row.try_get("state_data")?)?;
        let error_details: Option<ErrorDetails> = row
            .try_get::<Option<serde_json::Value>, _>("error_details")?
            .map(serde_json::from_value)
            .transpose()?;

        Ok(SagaState {
            id: SagaId::from_uuid(row.try_get::<Uuid, _>("id")?),
            saga_type: row.try_get("saga_type")?,
            aggregate_id: OrderId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            correlation_id: row.try_get("correlation_id")?,
            current_step,
            status,
            state_data,
            error_details,
            retry_count: row.try_get::<i32, _>("retry_count")? as u32,
            completed_at: row.try_get("completed_at")?,
            failed_at: row.try_get("failed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn create(&self, state: &SagaState) -> Result<SagaState> {
        let mut stored = state.clone();
        stored.updated_at = Utc::now();

        let state_data = serde_json::to_value(&stored.state_data)?;
        let error_details = stored
            .error_details
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO saga_states
                (id, saga_type, aggregate_id, correlation_id, current_step, status,
                 state_data, error_details, retry_count, completed_at, failed_at,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(stored.id.as_uuid())
        .bind(&stored.saga_type)
        .bind(stored.aggregate_id.as_uuid())
        .bind(&stored.correlation_id)
        .bind(stored.current_step.as_str())
        .bind(stored.status.as_str())
        .bind(state_data)
        .bind(error_details)
        .bind(stored.retry_count as i32)
        .bind(stored.completed_at)
        .bind(stored.failed_at)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("saga_states_pkey") {
                    return SagaStoreError::DuplicateSaga(state.id);
                }
                if db_err.constraint() == Some("unique_active_saga_per_order") {
                    return SagaStoreError::ActiveSagaExists(state.aggregate_id);
                }
            }
            SagaStoreError::Database(e)
        })?;

        tracing::debug!(
            saga_id = %stored.id,
            order_id = %stored.aggregate_id,
            "saga state created"
        );
        Ok(stored)
    }

    async fn save(&self, state: &SagaState) -> Result<SagaState> {
        let mut stored = state.clone();
        stored.updated_at = Utc::now();

        let state_data = serde_json::to_value(&stored.state_data)?;
        let error_details = stored
            .error_details
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE saga_states
            SET current_step = $2,
                status = $3,
                state_data = $4,
                error_details = $5,
                retry_count = $6,
                completed_at = $7,
                failed_at = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(stored.id.as_uuid())
        .bind(stored.current_step.as_str())
        .bind(stored.status.as_str())
        .bind(state_data)
        .bind(error_details)
        .bind(stored.retry_count as i32)
        .bind(stored.completed_at)
        .bind(stored.failed_at)
        .bind(stored.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(saga_id = %stored.id, "save hit a missing saga row");
            return Err(SagaStoreError::SagaNotFound(state.id));
        }

        tracing::debug!(
            saga_id = %stored.id,
            status = %stored.status,
            step = %stored.current_step,
            "saga state saved"
        );
        Ok(stored)
    }

    async fn find_one(&self, saga_id: SagaId) -> Result<Option<SagaState>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, saga_type, aggregate_id, correlation_id, current_step, status,
                   state_data, error_details, retry_count, completed_at, failed_at,
                   created_at, updated_at
            FROM saga_states
            WHERE id = $1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_state).transpose()
    }
}
