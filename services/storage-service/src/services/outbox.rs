use std::time::Duration;

use resilience::RetrySchedule;
use tokio_util::sync::CancellationToken;

use crate::db::{with_db_retry, TxManager};
use crate::error::StorageResult;
use crate::models::OutboxRow;
use crate::repositories::OutboxRepo;

/// Dispatcher-facing outbox operations: claim a leased batch, delete on
/// broker ack. Both are wrapped in the transient-DB retry schedule.
pub struct OutboxService {
    tm: TxManager,
    outbox: OutboxRepo,
    token: CancellationToken,
    retry: RetrySchedule,
}

impl OutboxService {
    pub fn new(
        tm: TxManager,
        outbox: OutboxRepo,
        token: CancellationToken,
        retry: RetrySchedule,
    ) -> Self {
        Self {
            tm,
            outbox,
            token,
            retry,
        }
    }

    /// Claim up to `max_count` eligible rows, extending each lease by
    /// `retry_after`.
    pub async fn get(&self, max_count: i32, retry_after: Duration) -> StorageResult<Vec<OutboxRow>> {
        let tm = &self.tm;

        with_db_retry(&self.token, &self.retry, || {
            let outbox = self.outbox.clone();
            async move {
                tm.with_tx(move |tx| {
                    Box::pin(async move { outbox.claim(tx, max_count, retry_after).await })
                })
                .await
            }
        })
        .await
    }

    pub async fn delete(&self, id: i64) -> StorageResult<()> {
        let outbox = &self.outbox;

        with_db_retry(&self.token, &self.retry, || async move {
            outbox.delete(id).await
        })
        .await
    }
}
