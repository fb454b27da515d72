//! Postgres-backed [`TaskStore`].
//!
//! `store_task` enforces a monotone status invariant against whatever is
//! already persisted, rejecting a write that would regress a task's status.

use async_trait::async_trait;
use maestro_core::id::ResourceId;
use maestro_core::store::TaskStore;
use maestro_core::task::{Action, LogEntry, RemoteTaskRef, Task, TaskStatus};
use maestro_core::Result as CoreResult;

use crate::error::DbError;
use crate::PgStore;

fn action_to_str(a: Action) -> &'static str {
    match a {
        Action::CreateAsg => "create-asg",
        Action::WaitForInstanceHealth => "wait-for-instance-health",
        Action::EnableAsg => "enable-asg",
        Action::WaitForElbHealth => "wait-for-elb-health",
        Action::DisableAsg => "disable-asg",
        Action::DeleteAsg => "delete-asg",
    }
}

fn action_from_str(s: &str) -> Result<Action, DbError> {
    Ok(match s {
        "create-asg" => Action::CreateAsg,
        "wait-for-instance-health" => Action::WaitForInstanceHealth,
        "enable-asg" => Action::EnableAsg,
        "wait-for-elb-health" => Action::WaitForElbHealth,
        "disable-asg" => Action::DisableAsg,
        "delete-asg" => Action::DeleteAsg,
        other => return Err(DbError::Decode(format!("unknown action '{other}'"))),
    })
}

fn status_to_str(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Terminated => "terminated",
    }
}

fn status_from_str(s: &str) -> Result<TaskStatus, DbError> {
    Ok(match s {
        "pending" => TaskStatus::Pending,
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        "terminated" => TaskStatus::Terminated,
        other => return Err(DbError::Decode(format!("unknown task status '{other}'"))),
    })
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: uuid::Uuid,
    position: i16,
    action: String,
    status: String,
    start: Option<chrono::DateTime<chrono::Utc>>,
    end: Option<chrono::DateTime<chrono::Utc>>,
    remote: Option<serde_json::Value>,
    log: serde_json::Value,
}

impl TaskRow {
    fn into_task(self) -> Result<Task, DbError> {
        let remote: Option<RemoteTaskRef> = self
            .remote
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let log: Vec<LogEntry> =
            serde_json::from_value(self.log).map_err(|e| DbError::Decode(e.to_string()))?;
        Ok(Task {
            id: ResourceId::from_uuid(self.id),
            action: action_from_str(&self.action)?,
            status: status_from_str(&self.status)?,
            start: self.start,
            end: self.end,
            remote,
            log,
        })
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn store_task(&self, deployment_id: ResourceId, task: &Task) -> CoreResult<()> {
        let position = Action::SEQUENCE
            .iter()
            .position(|a| *a == task.action)
            .expect("action is always one of the fixed six") as i16;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let existing: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM tasks WHERE deployment_id = $1 AND position = $2 FOR UPDATE",
        )
        .bind(deployment_id.as_uuid())
        .bind(position)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if let Some((current,)) = &existing {
            let current = status_from_str(current)?;
            if current != task.status && !current.can_advance_to(task.status) {
                return Err(DbError::Conflict(format!(
                    "task {:?} cannot move from {:?} to {:?}",
                    task.action, current, task.status
                ))
                .into());
            }
        }

        let remote =
            task.remote.as_ref().map(serde_json::to_value).transpose().map_err(|e| DbError::Decode(e.to_string()))?;
        let log = serde_json::to_value(&task.log).map_err(|e| DbError::Decode(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, deployment_id, position, action, status, start, "end", remote, log)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (deployment_id, position) DO UPDATE SET
                status = EXCLUDED.status,
                start = EXCLUDED.start,
                "end" = EXCLUDED."end",
                remote = EXCLUDED.remote,
                log = EXCLUDED.log
            "#,
        )
        .bind(task.id.as_uuid())
        .bind(deployment_id.as_uuid())
        .bind(position)
        .bind(action_to_str(task.action))
        .bind(status_to_str(task.status))
        .bind(task.start)
        .bind(task.end)
        .bind(remote)
        .bind(log)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    async fn get_tasks(&self, deployment_id: ResourceId) -> CoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE deployment_id = $1 ORDER BY position ASC",
        )
        .bind(deployment_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.into_task()?);
        }
        Ok(out)
    }
}
