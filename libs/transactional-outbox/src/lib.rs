//! # Transactional Outbox Dispatcher
//!
//! This library implements the publishing half of the Transactional Outbox
//! pattern. Business services insert an outbox row in the same database
//! transaction as the state change it describes; this crate drains those
//! rows onto Kafka with at-least-once delivery.
//!
//! ## How delivery works
//!
//! 1. A single **fetcher** task claims a bounded batch of eligible rows.
//!    Claiming extends each row's lease (`next_send_at`) by the retry
//!    interval, so no other dispatcher picks the row up while it is in
//!    flight.
//! 2. N **worker** tasks consume the claimed rows from a bounded queue,
//!    publish each one to its topic and delete the row only after the
//!    broker acknowledged the delivery.
//! 3. A failed publish or delete leaves the row in place: once its extended
//!    lease expires the fetcher claims it again. Silence *is* the retry
//!    schedule.
//!
//! Crashing between publish and delete re-sends the row after the lease
//! expires, so downstream consumers must be idempotent.
//!
//! ## Back-pressure
//!
//! The fetcher asks the store for at most `queue capacity - queue length`
//! rows per tick and blocks while the queue is full, which pauses database
//! polling whenever the workers fall behind. The queue holds
//! `num_workers * 2` rows so workers never idle while a fetch round-trip is
//! in progress.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use transactional_outbox::{DispatcherConfig, KafkaPublisher, OutboxDispatcher};
//! # use transactional_outbox::OutboxStore;
//! # async fn example<S: OutboxStore + 'static>(store: Arc<S>) -> anyhow::Result<()> {
//! let publisher = Arc::new(KafkaPublisher::connect("localhost:9092")?);
//!
//! let dispatcher = OutboxDispatcher::new(
//!     DispatcherConfig {
//!         num_workers: 3,
//!         retry_interval: Duration::from_secs(30),
//!         dispatch_interval: Duration::from_secs(1),
//!     },
//!     store,
//!     publisher,
//! );
//!
//! let token = CancellationToken::new();
//! let mut errors = dispatcher.run(token.clone());
//! while let Some(err) = errors.recv().await {
//!     tracing::error!(error = %err, "outbox dispatch error");
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

mod dispatcher;
mod error;
pub mod metrics;
mod publisher;

pub use dispatcher::{DispatcherConfig, OutboxDispatcher};
pub use error::{OutboxError, OutboxResult};
pub use metrics::OutboxMetrics;
pub use publisher::KafkaPublisher;

/// A pending broker message claimed from the outbox table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxMessage {
    /// Monotonic row identifier
    pub id: i64,
    /// Destination topic
    pub topic: String,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

/// The slice of outbox storage the dispatcher consumes.
///
/// `fetch` must claim at most `max_count` eligible rows and extend each
/// claimed row's lease by `retry_in`, so a concurrent dispatcher (or a retry
/// after a crash) does not re-claim them before the lease expires.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn fetch(&self, max_count: i32, retry_in: Duration)
        -> anyhow::Result<Vec<OutboxMessage>>;

    /// Remove a row after the broker acknowledged its delivery.
    async fn delete(&self, id: i64) -> anyhow::Result<()>;
}

/// The slice of the broker a worker consumes.
///
/// `send` resolves only once the broker acknowledged the message (or the
/// token was cancelled), so callers can sequence publish-then-delete.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn send(
        &self,
        token: &CancellationToken,
        topic: &str,
        payload: &[u8],
    ) -> OutboxResult<()>;
}
