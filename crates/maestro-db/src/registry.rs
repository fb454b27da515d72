//! Control-plane registries: the global lock flag, the
//! per-triple in-progress slot, and pause flags. Each is a small CAS
//! operation against a dedicated table, the same shape as the job queue's
//! `UPDATE ... WHERE` claim pattern.

use async_trait::async_trait;
use maestro_core::deployment::DeploymentKey;
use maestro_core::id::ResourceId;
use maestro_core::store::{InProgressRegistry, PauseRegistry};

use crate::error::DbResult;
use crate::PgStore;

impl PgStore {
    /// Attempt to acquire the global deployment lock. Returns `true` if this
    /// call acquired it, `false` if it was already held.
    pub async fn try_lock(&self) -> DbResult<bool> {
        let result = sqlx::query("UPDATE lock_flag SET locked = TRUE WHERE id = 1 AND locked = FALSE")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn unlock(&self) -> DbResult<()> {
        sqlx::query("UPDATE lock_flag SET locked = FALSE WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_locked(&self) -> DbResult<bool> {
        let (locked,): (bool,) = sqlx::query_as("SELECT locked FROM lock_flag WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(locked)
    }

    /// Claim the in-progress slot for `key`. Fails with [`DbError::Conflict`]
    /// if another deployment already occupies it.
    pub async fn claim_in_progress(&self, key: &DeploymentKey, deployment_id: ResourceId) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO in_progress (application, environment, region, deployment_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (application, environment, region) DO NOTHING
            "#,
        )
        .bind(&key.application)
        .bind(&key.environment)
        .bind(&key.region)
        .bind(deployment_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn release_in_progress(&self, key: &DeploymentKey) -> DbResult<()> {
        sqlx::query(
            "DELETE FROM in_progress WHERE application = $1 AND environment = $2 AND region = $3",
        )
        .bind(&key.application)
        .bind(&key.environment)
        .bind(&key.region)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn in_progress_deployment(&self, key: &DeploymentKey) -> DbResult<Option<ResourceId>> {
        let row: Option<(uuid::Uuid,)> = sqlx::query_as(
            "SELECT deployment_id FROM in_progress WHERE application = $1 AND environment = $2 AND region = $3",
        )
        .bind(&key.application)
        .bind(&key.environment)
        .bind(&key.region)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| ResourceId::from_uuid(id)))
    }

    pub async fn list_in_progress(&self) -> DbResult<Vec<DeploymentKey>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT application, environment, region FROM in_progress",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(application, environment, region)| DeploymentKey { application, environment, region })
            .collect())
    }

    /// Insert a pause flag for `key`. Returns `false` if already paused.
    pub async fn pause(&self, key: &DeploymentKey) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO pause_flags (application, environment, region)
            VALUES ($1, $2, $3)
            ON CONFLICT (application, environment, region) DO NOTHING
            "#,
        )
        .bind(&key.application)
        .bind(&key.environment)
        .bind(&key.region)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn resume(&self, key: &DeploymentKey) -> DbResult<()> {
        sqlx::query(
            "DELETE FROM pause_flags WHERE application = $1 AND environment = $2 AND region = $3",
        )
        .bind(&key.application)
        .bind(&key.environment)
        .bind(&key.region)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_paused(&self, key: &DeploymentKey) -> DbResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM pause_flags WHERE application = $1 AND environment = $2 AND region = $3",
        )
        .bind(&key.application)
        .bind(&key.environment)
        .bind(&key.region)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn list_paused(&self) -> DbResult<Vec<DeploymentKey>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT application, environment, region FROM pause_flags",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(application, environment, region)| DeploymentKey { application, environment, region })
            .collect())
    }
}

#[async_trait]
impl PauseRegistry for PgStore {
    async fn is_paused(&self, key: &DeploymentKey) -> maestro_core::Result<bool> {
        Ok(PgStore::is_paused(self, key).await?)
    }
}

#[async_trait]
impl InProgressRegistry for PgStore {
    async fn release(&self, key: &DeploymentKey) -> maestro_core::Result<()> {
        Ok(PgStore::release_in_progress(self, key).await?)
    }
}
