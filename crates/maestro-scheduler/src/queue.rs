//! The per-deployment work queue: a Postgres-backed FIFO a worker
//! claims one message from at a time, using a `SKIP LOCKED` claim keyed so
//! at most one outstanding message per deployment id is ever claimed
//! concurrently — the mechanism behind per-deployment write serialization.

use maestro_core::id::ResourceId;
use maestro_db::{DbError, DbResult};
use sqlx::PgPool;
use uuid::Uuid;

/// Which stage of a deployment's lifecycle a queued message advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Run the parameter pipeline (C3) to resolve the deployment record.
    Prepare,
    /// Run the task executor (C4) against an already-resolved record.
    Execute,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Prepare => "prepare",
            MessageKind::Execute => "execute",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "prepare" => Some(MessageKind::Prepare),
            "execute" => Some(MessageKind::Execute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub id: Uuid,
    pub deployment_id: ResourceId,
    pub kind: MessageKind,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    deployment_id: Uuid,
    kind: String,
}

impl TryFrom<MessageRow> for QueuedMessage {
    type Error = DbError;

    fn try_from(row: MessageRow) -> DbResult<Self> {
        let kind = MessageKind::parse(&row.kind).ok_or_else(|| DbError::Decode(format!("unknown work queue message kind '{}'", row.kind)))?;
        Ok(QueuedMessage { id: row.id, deployment_id: ResourceId::from_uuid(row.deployment_id), kind })
    }
}

pub struct WorkQueue {
    pool: PgPool,
}

impl WorkQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(&self, deployment_id: ResourceId, kind: MessageKind) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO work_queue (id, deployment_id, kind, status, created_at)
            VALUES ($1, $2, $3, 'pending', NOW())
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(deployment_id.as_uuid())
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Claim the oldest pending message whose deployment id has no other
    /// message already claimed, so two workers never process the same
    /// deployment concurrently.
    pub async fn claim(&self, worker_id: &str) -> DbResult<Option<QueuedMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(
            r#"
            UPDATE work_queue
            SET status = 'claimed', claimed_by = $1, claimed_at = NOW()
            WHERE id = (
                SELECT id FROM work_queue
                WHERE status = 'pending'
                  AND deployment_id NOT IN (SELECT deployment_id FROM work_queue WHERE status = 'claimed')
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, deployment_id, kind
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueuedMessage::try_from).transpose()
    }

    pub async fn complete(&self, message_id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE work_queue SET status = 'completed' WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn fail(&self, message_id: Uuid, error: &str) -> DbResult<()> {
        sqlx::query("UPDATE work_queue SET status = 'failed', claimed_by = claimed_by || ' (' || $2 || ')' WHERE id = $1")
            .bind(message_id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_round_trips_through_its_db_string() {
        assert_eq!(MessageKind::parse(MessageKind::Prepare.as_str()), Some(MessageKind::Prepare));
        assert_eq!(MessageKind::parse(MessageKind::Execute.as_str()), Some(MessageKind::Execute));
    }

    #[test]
    fn unknown_kind_string_fails_to_parse() {
        assert_eq!(MessageKind::parse("purge"), None);
    }

    #[test]
    fn message_row_with_unknown_kind_is_rejected() {
        let row = MessageRow { id: Uuid::now_v7(), deployment_id: Uuid::now_v7(), kind: "purge".to_string() };
        assert!(QueuedMessage::try_from(row).is_err());
    }
}
