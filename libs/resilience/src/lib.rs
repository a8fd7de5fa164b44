//! Retry schedules with cooperative cancellation.
//!
//! A [`RetrySchedule`] is an ordered list of backoff delays. Bounded
//! schedules give up with [`RetryError::AllAttemptsFailed`] once the list is
//! exhausted; infinite schedules pin the index at the last delay and keep
//! going until the operation succeeds, the predicate rejects the error, or
//! the cancellation token fires. Every sleep races the token, so shutdown is
//! never delayed by a pending backoff.

mod retry;

pub use retry::{retry, retry_with, sleep_cancellable, RetryError, RetrySchedule};
