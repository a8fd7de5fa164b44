//! Error types for the outbox dispatcher library.

use thiserror::Error;

/// Result type alias for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Errors that can occur while dispatching outbox messages.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Fetching a batch of pending messages from the store failed
    #[error("fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),

    /// Publishing a message to the broker failed
    #[error("publish failed: {0}")]
    Publish(String),

    /// Deleting an acknowledged message from the store failed
    #[error("delete failed: {0}")]
    Delete(#[source] anyhow::Error),

    /// The operation was interrupted by cancellation
    #[error("operation canceled")]
    Canceled,
}
