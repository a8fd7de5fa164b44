use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;

use crate::error::StorageResult;
use crate::models::{OutboxRow, OutboxStencil};

/// Access to the `outbox` work queue.
///
/// Scheduling runs inside the caller's transaction so the message becomes
/// visible atomically with the business write. Claiming and deleting are
/// dispatcher-side operations.
#[derive(Clone)]
pub struct OutboxRepo {
    pool: PgPool,
}

impl OutboxRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn schedule(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        stencil: &OutboxStencil,
        send_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox (topic, payload, next_send_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(stencil.topic.as_str())
        .bind(&stencil.payload)
        .bind(send_at)
        .execute(&mut **tx)
        .await?;

        debug!(topic = %stencil.topic, "outbox message scheduled");

        Ok(())
    }

    /// Claim a batch of eligible rows and extend their lease by `retry_in`.
    ///
    /// `FOR UPDATE SKIP LOCKED` lets concurrent dispatchers claim disjoint
    /// batches without head-of-line blocking; the lease advance keeps a
    /// claimed row invisible to the next claim until it expires. Both
    /// statements run in the caller's transaction.
    pub async fn claim(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        limit: i32,
        retry_in: Duration,
    ) -> StorageResult<Vec<OutboxRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, payload
            FROM outbox
            WHERE next_send_at <= now()
            ORDER BY id
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(i64::from(limit.max(0)))
        .fetch_all(&mut **tx)
        .await?;

        let claimed = rows
            .into_iter()
            .map(|row| {
                Ok(OutboxRow {
                    id: row.try_get("id")?,
                    topic: row.try_get("topic")?,
                    payload: row.try_get("payload")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        if claimed.is_empty() {
            return Ok(claimed);
        }

        let ids: Vec<i64> = claimed.iter().map(|row| row.id).collect();
        sqlx::query(
            r#"
            UPDATE outbox
            SET next_send_at = next_send_at + make_interval(secs => $2)
            WHERE id = ANY($1)
            "#,
        )
        .bind(&ids)
        .bind(retry_in.as_secs_f64())
        .execute(&mut **tx)
        .await?;

        debug!(count = claimed.len(), "outbox batch claimed");

        Ok(claimed)
    }

    /// Remove a row once the broker acknowledged its delivery. Deleting an
    /// already-deleted row is a no-op; re-sent duplicates are the
    /// consumer's concern.
    pub async fn delete(&self, id: i64) -> StorageResult<()> {
        sqlx::query("DELETE FROM outbox WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
