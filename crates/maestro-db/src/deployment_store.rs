//! Postgres-backed [`DeploymentStore`].
//!
//! Per-deployment writes are serialized with a `SELECT ... FOR UPDATE` row
//! lock held for the duration of the read-modify-write transaction, rather
//! than an in-process mutex, so the guarantee holds across multiple
//! `maestro-scheduler` workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maestro_core::deployment::{AsgState, Deployment, Phase, Status};
use maestro_core::id::ResourceId;
use maestro_core::store::{DeploymentQuery, DeploymentStore, TaskStore};
use maestro_core::task::LogEntry;
use maestro_core::Result as CoreResult;
use sqlx::Row;

use crate::error::DbError;
use crate::PgStore;

fn phase_to_str(p: Phase) -> &'static str {
    match p {
        Phase::Preparation => "preparation",
        Phase::Deployment => "deployment",
        Phase::Completed => "completed",
        Phase::Failed => "failed",
    }
}

fn phase_from_str(s: &str) -> Result<Phase, DbError> {
    Ok(match s {
        "preparation" => Phase::Preparation,
        "deployment" => Phase::Deployment,
        "completed" => Phase::Completed,
        "failed" => Phase::Failed,
        other => return Err(DbError::Decode(format!("unknown phase '{other}'"))),
    })
}

fn status_to_str(s: Status) -> &'static str {
    match s {
        Status::Running => "running",
        Status::Completed => "completed",
        Status::Failed => "failed",
        Status::Terminated => "terminated",
        Status::Paused => "paused",
    }
}

fn status_from_str(s: &str) -> Result<Status, DbError> {
    Ok(match s {
        "running" => Status::Running,
        "completed" => Status::Completed,
        "failed" => Status::Failed,
        "terminated" => Status::Terminated,
        "paused" => Status::Paused,
        other => return Err(DbError::Decode(format!("unknown status '{other}'"))),
    })
}

#[derive(sqlx::FromRow)]
struct DeploymentRow {
    id: uuid::Uuid,
    application: String,
    environment: String,
    region: String,
    #[sqlx(rename = "user")]
    user_: String,
    message: String,
    created: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    phase: String,
    status: String,
    rollback: bool,
    silent: bool,
    failure_cause: Option<String>,
    new_state: serde_json::Value,
    previous_state: Option<serde_json::Value>,
}

impl DeploymentRow {
    fn into_deployment(self, tasks: Vec<maestro_core::task::Task>) -> Result<Deployment, DbError> {
        let new_state: AsgState =
            serde_json::from_value(self.new_state).map_err(|e| DbError::Decode(e.to_string()))?;
        let previous_state = self
            .previous_state
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(Deployment {
            id: ResourceId::from_uuid(self.id),
            application: self.application,
            environment: self.environment,
            region: self.region,
            user: self.user_,
            message: self.message,
            created: self.created,
            start: self.start,
            end: self.end,
            phase: phase_from_str(&self.phase)?,
            status: status_from_str(&self.status)?,
            new_state,
            previous_state,
            tasks,
            rollback: self.rollback,
            silent: self.silent,
            failure_cause: self.failure_cause,
        })
    }
}

impl PgStore {
    async fn fetch_deployment_row(&self, id: ResourceId) -> Result<DeploymentRow, DbError> {
        sqlx::query_as::<_, DeploymentRow>("SELECT * FROM deployments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("deployment {id}")))
    }
}

#[async_trait]
impl DeploymentStore for PgStore {
    async fn store_deployment(&self, deployment: &Deployment) -> CoreResult<()> {
        let new_state = serde_json::to_value(&deployment.new_state)
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let previous_state = deployment
            .previous_state
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::Decode(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO deployments
                (id, application, environment, region, "user", message, created, start, "end",
                 phase, status, rollback, silent, failure_cause, new_state, previous_state)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                start = EXCLUDED.start,
                "end" = EXCLUDED."end",
                phase = EXCLUDED.phase,
                status = EXCLUDED.status,
                failure_cause = EXCLUDED.failure_cause,
                new_state = EXCLUDED.new_state,
                previous_state = EXCLUDED.previous_state
            "#,
        )
        .bind(deployment.id.as_uuid())
        .bind(&deployment.application)
        .bind(&deployment.environment)
        .bind(&deployment.region)
        .bind(&deployment.user)
        .bind(&deployment.message)
        .bind(deployment.created)
        .bind(deployment.start)
        .bind(deployment.end)
        .bind(phase_to_str(deployment.phase))
        .bind(status_to_str(deployment.status))
        .bind(deployment.rollback)
        .bind(deployment.silent)
        .bind(&deployment.failure_cause)
        .bind(new_state)
        .bind(previous_state)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        for task in &deployment.tasks {
            self.store_task(deployment.id, task).await?;
        }

        Ok(())
    }

    async fn get_deployment(&self, id: ResourceId) -> CoreResult<Deployment> {
        let row = self.fetch_deployment_row(id).await?;
        let tasks = self.get_tasks(id).await?;
        Ok(row.into_deployment(tasks)?)
    }

    async fn add_to_deployment_parameters(
        &self,
        id: ResourceId,
        partial: serde_json::Value,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let row = sqlx::query("SELECT new_state FROM deployments WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DbError::NotFound(format!("deployment {id}")))?;

        let current: serde_json::Value = row.try_get("new_state").map_err(DbError::from)?;
        let mut new_state: AsgState =
            serde_json::from_value(current).map_err(|e| DbError::Decode(e.to_string()))?;

        if let serde_json::Value::Object(map) = partial {
            for (k, v) in map {
                new_state.deployment_params.insert(k, v);
            }
        }

        let encoded =
            serde_json::to_value(&new_state).map_err(|e| DbError::Decode(e.to_string()))?;
        sqlx::query("UPDATE deployments SET new_state = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(encoded)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    async fn append_log(&self, id: ResourceId, message: &str) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO deployment_logs (deployment_id, date, message) VALUES ($1, NOW(), $2)",
        )
        .bind(id.as_uuid())
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        Ok(())
    }

    async fn get_logs(
        &self,
        id: ResourceId,
        since: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<LogEntry>> {
        let rows: Vec<(DateTime<Utc>, String)> = sqlx::query_as(
            r#"
            SELECT date, message FROM deployment_logs
            WHERE deployment_id = $1 AND ($2::timestamptz IS NULL OR date >= $2)
            ORDER BY date ASC
            "#,
        )
        .bind(id.as_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|(date, message)| LogEntry { date, message })
            .collect())
    }

    async fn last_deployment_for(
        &self,
        application: &str,
        environment: &str,
        region: &str,
    ) -> CoreResult<Option<Deployment>> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT * FROM deployments
            WHERE application = $1 AND environment = $2 AND region = $3
            ORDER BY created DESC
            LIMIT 1
            "#,
        )
        .bind(application)
        .bind(environment)
        .bind(region)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let id = ResourceId::from_uuid(row.id);
                let tasks = self.get_tasks(id).await?;
                Ok(Some(row.into_deployment(tasks)?))
            }
        }
    }

    async fn penultimate_completed_deployment_for(
        &self,
        application: &str,
        environment: &str,
        region: &str,
    ) -> CoreResult<Option<Deployment>> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT * FROM deployments
            WHERE application = $1 AND environment = $2 AND region = $3 AND status = 'completed'
            ORDER BY created DESC
            OFFSET 1
            LIMIT 1
            "#,
        )
        .bind(application)
        .bind(environment)
        .bind(region)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let id = ResourceId::from_uuid(row.id);
                let tasks = self.get_tasks(id).await?;
                Ok(Some(row.into_deployment(tasks)?))
            }
        }
    }

    async fn deployment_for_asg_name(
        &self,
        application: &str,
        environment: &str,
        region: &str,
        asg_name: &str,
        excluding: ResourceId,
    ) -> CoreResult<Option<Deployment>> {
        let row = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT * FROM deployments
            WHERE application = $1 AND environment = $2 AND region = $3
              AND status = 'completed' AND id <> $4
              AND new_state ->> 'auto_scaling_group_name' = $5
            ORDER BY created DESC
            LIMIT 1
            "#,
        )
        .bind(application)
        .bind(environment)
        .bind(region)
        .bind(excluding.as_uuid())
        .bind(asg_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        match row {
            None => Ok(None),
            Some(row) => {
                let id = ResourceId::from_uuid(row.id);
                let tasks = self.get_tasks(id).await?;
                Ok(Some(row.into_deployment(tasks)?))
            }
        }
    }

    async fn query_deployments(&self, query: DeploymentQuery) -> CoreResult<Vec<Deployment>> {
        let status = query.status.map(status_to_str);
        let size = query.size.unwrap_or(50).min(500) as i64;
        let offset = query.start_from.unwrap_or(0) as i64;

        let rows = sqlx::query_as::<_, DeploymentRow>(
            r#"
            SELECT * FROM deployments
            WHERE ($1::text IS NULL OR application = $1)
              AND ($2::text IS NULL OR environment = $2)
              AND ($3::text IS NULL OR region = $3)
              AND ($4::text IS NULL OR status = $4)
              AND ($5::timestamptz IS NULL OR created >= $5)
            ORDER BY created DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(query.application)
        .bind(query.environment)
        .bind(query.region)
        .bind(status)
        .bind(query.from)
        .bind(size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id = ResourceId::from_uuid(row.id);
            let tasks = self.get_tasks(id).await?;
            out.push(row.into_deployment(tasks)?);
        }
        Ok(out)
    }
}
