use std::future::Future;

use resilience::{RetryError, RetrySchedule};
use tokio_util::sync::CancellationToken;

use crate::error::{StorageError, StorageResult};

/// Retry a database operation across transient connection-family failures.
///
/// Non-transient errors surface on the first attempt; exhausting the
/// schedule yields [`StorageError::AllAttemptsFailed`].
pub async fn with_db_retry<T, F, Fut>(
    token: &CancellationToken,
    schedule: &RetrySchedule,
    op: F,
) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StorageResult<T>>,
{
    match resilience::retry_with(token, schedule, op, StorageError::is_transient).await {
        Ok(value) => Ok(value),
        Err(RetryError::Rejected(err)) => Err(err),
        Err(RetryError::AllAttemptsFailed) => Err(StorageError::AllAttemptsFailed),
        Err(RetryError::Canceled) => Err(StorageError::Canceled),
    }
}
