use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// An ordered sequence of backoff delays.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    /// Delay applied after the n-th failed attempt.
    pub delays: Vec<Duration>,
    /// Keep retrying with the last delay once the sequence is exhausted.
    pub infinite: bool,
}

impl RetrySchedule {
    pub fn bounded(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            infinite: false,
        }
    }

    pub fn infinite(delays: Vec<Duration>) -> Self {
        Self {
            delays,
            infinite: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt in a bounded schedule failed.
    #[error("all attempts failed")]
    AllAttemptsFailed,
    /// The predicate declared the error non-retryable.
    #[error("operation failed: {0}")]
    Rejected(E),
    /// The cancellation token fired before the operation succeeded.
    #[error("retry canceled")]
    Canceled,
}

/// Sleep for `duration`, waking early if `token` is cancelled.
///
/// Returns `Err(())` when the sleep was interrupted by cancellation.
pub async fn sleep_cancellable(token: &CancellationToken, duration: Duration) -> Result<(), ()> {
    tokio::select! {
        _ = token.cancelled() => Err(()),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Run `op` until it succeeds, following `schedule` between attempts.
///
/// `should_retry` inspects each error; returning `false` stops the loop and
/// surfaces the error as [`RetryError::Rejected`].
pub async fn retry_with<F, Fut, T, E>(
    token: &CancellationToken,
    schedule: &RetrySchedule,
    mut op: F,
    mut should_retry: impl FnMut(&E) -> bool,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: usize = 0;

    while attempt < schedule.delays.len() {
        if token.is_cancelled() {
            return Err(RetryError::Canceled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !should_retry(&err) {
                    return Err(RetryError::Rejected(err));
                }
                warn!(attempt, error = %err, "attempt failed, backing off");
            }
        }

        if sleep_cancellable(token, schedule.delays[attempt]).await.is_err() {
            return Err(RetryError::Canceled);
        }

        attempt += 1;
        if schedule.infinite {
            attempt = attempt.min(schedule.delays.len() - 1);
        }
    }

    Err(RetryError::AllAttemptsFailed)
}

/// [`retry_with`] with every error considered retryable.
pub async fn retry<F, Fut, T, E>(
    token: &CancellationToken,
    schedule: &RetrySchedule,
    op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with(token, schedule, op, |_| true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_schedule(n: usize) -> RetrySchedule {
        RetrySchedule::bounded(vec![Duration::from_millis(5); n])
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry(&token, &quick_schedule(3), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry(&token, &quick_schedule(3), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bounded_schedule_gives_up() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry(&token, &quick_schedule(2), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<i32, _>("persistent") }
        })
        .await;

        assert!(matches!(result, Err(RetryError::AllAttemptsFailed)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn predicate_rejection_stops_immediately() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry_with(
            &token,
            &quick_schedule(5),
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("fatal") }
            },
            |_| false,
        )
        .await;

        assert!(matches!(result, Err(RetryError::Rejected("fatal"))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn infinite_schedule_pins_the_last_delay() {
        let token = CancellationToken::new();
        let schedule = RetrySchedule::infinite(vec![Duration::from_millis(1)]);
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        // Fails far more times than the schedule has delays, then succeeds.
        let result = retry(&token, &schedule, move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 10 {
                    Err("still down")
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_backoff() {
        let token = CancellationToken::new();
        let schedule = RetrySchedule::infinite(vec![Duration::from_secs(60)]);

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<(), _> =
            retry(&token, &schedule, || async { Err::<(), _>("down") }).await;

        assert!(matches!(result, Err(RetryError::Canceled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
