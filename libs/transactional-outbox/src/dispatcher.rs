use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::OutboxError;
use crate::metrics::OutboxMetrics;
use crate::{MessagePublisher, OutboxMessage, OutboxStore};

/// Extra queue slots per worker so workers keep busy while the next
/// database round-trip is in progress.
const BUFFER_OVERHEAD: usize = 1;

/// Capacity of the fan-in error stream returned by [`OutboxDispatcher::run`].
const ERROR_STREAM_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of parallel publisher workers
    pub num_workers: usize,
    /// Lease extension requested for every claimed row; also the soft retry
    /// schedule for rows whose publish or delete failed
    pub retry_interval: Duration,
    /// Minimum delay between two fetch ticks
    pub dispatch_interval: Duration,
}

/// Concurrent producer pipeline: one lease-claiming fetcher feeding N
/// publisher workers through a bounded queue.
pub struct OutboxDispatcher<S, P> {
    cfg: DispatcherConfig,
    store: Arc<S>,
    publisher: Arc<P>,
    metrics: Option<OutboxMetrics>,
}

impl<S, P> OutboxDispatcher<S, P>
where
    S: OutboxStore + 'static,
    P: MessagePublisher + 'static,
{
    pub fn new(cfg: DispatcherConfig, store: Arc<S>, publisher: Arc<P>) -> Self {
        Self {
            cfg,
            store,
            publisher,
            metrics: None,
        }
    }

    /// Attach Prometheus instrumentation to the pipeline.
    pub fn with_metrics(mut self, metrics: OutboxMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the fetcher and worker tasks and return the merged error
    /// stream.
    ///
    /// Errors are reported and survived: a failed fetch skips one tick, a
    /// failed publish or delete skips one message (the row's extended lease
    /// schedules the retry). The stream closes once cancellation has been
    /// observed and every task has drained.
    pub fn run(&self, token: CancellationToken) -> mpsc::Receiver<OutboxError> {
        let capacity = self.cfg.num_workers * (BUFFER_OVERHEAD + 1);
        let (msg_tx, msg_rx) = async_channel::bounded::<OutboxMessage>(capacity);
        let (err_tx, err_rx) = mpsc::channel::<OutboxError>(ERROR_STREAM_CAPACITY);

        info!(
            num_workers = self.cfg.num_workers,
            queue_capacity = capacity,
            retry_interval_secs = self.cfg.retry_interval.as_secs(),
            dispatch_interval_ms = self.cfg.dispatch_interval.as_millis() as u64,
            "outbox dispatcher starting"
        );

        tokio::spawn(fetcher_loop(
            self.cfg.clone(),
            capacity,
            self.store.clone(),
            msg_tx,
            err_tx.clone(),
            token.clone(),
        ));

        for worker_id in 0..self.cfg.num_workers {
            tokio::spawn(worker_loop(
                worker_id,
                msg_rx.clone(),
                self.store.clone(),
                self.publisher.clone(),
                self.metrics.clone(),
                err_tx.clone(),
                token.clone(),
            ));
        }

        // The receiver closes when the fetcher and every worker dropped
        // their sender clone, the same contract as a fan-in of per-task
        // error channels.
        err_rx
    }
}

/// Single-producer loop: claim at most the queue's free space per tick,
/// push to the workers (blocking while the queue is full), then sleep out
/// the rest of the dispatch interval.
async fn fetcher_loop<S: OutboxStore>(
    cfg: DispatcherConfig,
    capacity: usize,
    store: Arc<S>,
    msg_tx: async_channel::Sender<OutboxMessage>,
    err_tx: mpsc::Sender<OutboxError>,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let next_tick = Instant::now() + cfg.dispatch_interval;

        let available = capacity.saturating_sub(msg_tx.len());
        if available > 0 {
            match store.fetch(available as i32, cfg.retry_interval).await {
                Ok(messages) => {
                    debug!(count = messages.len(), "claimed outbox batch");
                    for message in messages {
                        tokio::select! {
                            _ = token.cancelled() => return,
                            sent = msg_tx.send(message) => {
                                if sent.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(err) => {
                    let _ = err_tx.send(OutboxError::Fetch(err)).await;
                }
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep_until(next_tick) => {}
        }
    }
}

/// Worker loop: publish, then delete on broker ack. Either failure leaves
/// the row leased in the store and moves on to the next message.
async fn worker_loop<S: OutboxStore, P: MessagePublisher>(
    worker_id: usize,
    msg_rx: async_channel::Receiver<OutboxMessage>,
    store: Arc<S>,
    publisher: Arc<P>,
    metrics: Option<OutboxMetrics>,
    err_tx: mpsc::Sender<OutboxError>,
    token: CancellationToken,
) {
    while let Ok(message) = msg_rx.recv().await {
        if token.is_cancelled() {
            break;
        }

        if let Some(m) = &metrics {
            m.inflight.inc();
        }

        let outcome = publisher
            .send(&token, &message.topic, &message.payload)
            .await;

        match outcome {
            Ok(()) => match store.delete(message.id).await {
                Ok(()) => {
                    if let Some(m) = &metrics {
                        m.published.inc();
                    }
                    debug!(worker_id, id = message.id, topic = %message.topic, "message dispatched");
                }
                Err(err) => {
                    if let Some(m) = &metrics {
                        m.delete_errors.inc();
                    }
                    let _ = err_tx.send(OutboxError::Delete(err)).await;
                }
            },
            // A cancelled send is a clean shutdown, not a delivery failure:
            // the row keeps its lease and the next start re-claims it.
            Err(OutboxError::Canceled) => {
                if let Some(m) = &metrics {
                    m.inflight.dec();
                }
                break;
            }
            Err(err) => {
                if let Some(m) = &metrics {
                    m.publish_errors.inc();
                }
                let _ = err_tx.send(err).await;
            }
        }

        if let Some(m) = &metrics {
            m.inflight.dec();
        }
    }

    debug!(worker_id, "worker finished");
}
