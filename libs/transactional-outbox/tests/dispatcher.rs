//! Pipeline tests against in-memory store and publisher doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use transactional_outbox::{
    DispatcherConfig, MessagePublisher, OutboxDispatcher, OutboxError, OutboxMessage, OutboxResult,
    OutboxStore,
};

/// Outbox table double: rows stay claimable until deleted, a claimed row is
/// invisible for the duration of its lease.
struct MemoryStore {
    rows: Mutex<HashMap<i64, (OutboxMessage, tokio::time::Instant)>>,
    max_fetch_limit: AtomicI32,
}

impl MemoryStore {
    fn with_rows(messages: Vec<OutboxMessage>) -> Arc<Self> {
        let now = tokio::time::Instant::now();
        Arc::new(Self {
            rows: Mutex::new(messages.into_iter().map(|m| (m.id, (m, now))).collect()),
            max_fetch_limit: AtomicI32::new(0),
        })
    }

    fn remaining(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn fetch(
        &self,
        max_count: i32,
        retry_in: Duration,
    ) -> anyhow::Result<Vec<OutboxMessage>> {
        self.max_fetch_limit.fetch_max(max_count, Ordering::SeqCst);

        let now = tokio::time::Instant::now();
        let mut rows = self.rows.lock().unwrap();
        let mut eligible: Vec<i64> = rows
            .iter()
            .filter(|(_, (_, lease))| *lease <= now)
            .map(|(id, _)| *id)
            .collect();
        eligible.sort_unstable();
        eligible.truncate(max_count.max(0) as usize);

        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            let entry = rows.get_mut(&id).unwrap();
            entry.1 = now + retry_in;
            claimed.push(entry.0.clone());
        }
        Ok(claimed)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }
}

/// Publisher double that can be told to fail or to block on a gate.
struct MemoryPublisher {
    delivered: Mutex<Vec<(String, Vec<u8>)>>,
    failing: AtomicBool,
    gate: Option<Arc<tokio::sync::Semaphore>>,
}

impl MemoryPublisher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
        })
    }

    fn gated(gate: Arc<tokio::sync::Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            delivered: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: Some(gate),
        })
    }

    fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn send(
        &self,
        token: &CancellationToken,
        topic: &str,
        payload: &[u8],
    ) -> OutboxResult<()> {
        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = token.cancelled() => return Err(OutboxError::Canceled),
                permit = gate.acquire() => { permit.unwrap().forget(); }
            }
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(OutboxError::Publish("broker unavailable".into()));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

fn message(id: i64) -> OutboxMessage {
    OutboxMessage {
        id,
        topic: "new_invoice".into(),
        payload: format!("{{\"id\":\"{id}\"}}").into_bytes(),
    }
}

fn config(num_workers: usize) -> DispatcherConfig {
    DispatcherConfig {
        num_workers,
        retry_interval: Duration::from_secs(30),
        dispatch_interval: Duration::from_millis(10),
    }
}

async fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    done()
}

#[tokio::test]
async fn delivers_every_row_and_deletes_it() {
    let store = MemoryStore::with_rows((1..=20).map(message).collect());
    let publisher = MemoryPublisher::new();
    let dispatcher = OutboxDispatcher::new(config(3), store.clone(), publisher.clone());

    let token = CancellationToken::new();
    let mut errors = dispatcher.run(token.clone());

    assert!(
        wait_until(Duration::from_secs(5), || store.remaining() == 0).await,
        "all rows should be dispatched and deleted"
    );
    assert_eq!(publisher.delivered_count(), 20);

    token.cancel();
    while errors.recv().await.is_some() {}
}

#[tokio::test]
async fn publish_failure_keeps_the_row_and_reports_the_error() {
    let store = MemoryStore::with_rows(vec![message(1)]);
    let publisher = MemoryPublisher::new();
    publisher.failing.store(true, Ordering::SeqCst);

    let dispatcher = OutboxDispatcher::new(config(1), store.clone(), publisher.clone());
    let token = CancellationToken::new();
    let mut errors = dispatcher.run(token.clone());

    let err = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .expect("an error should surface")
        .expect("stream should be open");
    assert!(matches!(err, OutboxError::Publish(_)));

    // The row survives for the post-lease retry.
    assert_eq!(store.remaining(), 1);
    assert_eq!(publisher.delivered_count(), 0);

    token.cancel();
    while errors.recv().await.is_some() {}
}

#[tokio::test]
async fn recovers_once_the_broker_comes_back() {
    let store = MemoryStore::with_rows(vec![message(1)]);
    let publisher = MemoryPublisher::new();
    publisher.failing.store(true, Ordering::SeqCst);

    // Lease short enough for the test to observe the retry.
    let cfg = DispatcherConfig {
        num_workers: 1,
        retry_interval: Duration::from_millis(50),
        dispatch_interval: Duration::from_millis(10),
    };
    let dispatcher = OutboxDispatcher::new(cfg, store.clone(), publisher.clone());
    let token = CancellationToken::new();
    let mut errors = dispatcher.run(token.clone());

    // First attempt fails.
    let err = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, OutboxError::Publish(_)));

    publisher.failing.store(false, Ordering::SeqCst);

    assert!(
        wait_until(Duration::from_secs(5), || store.remaining() == 0).await,
        "row should be re-claimed and delivered after the lease expired"
    );
    assert_eq!(publisher.delivered_count(), 1);

    token.cancel();
    drop(errors);
}

#[tokio::test]
async fn fetch_limit_never_exceeds_queue_capacity() {
    let num_workers = 3;
    let capacity = num_workers * 2;

    // Block every publish so the queue fills up.
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let store = MemoryStore::with_rows((1..=100).map(message).collect());
    let publisher = MemoryPublisher::gated(gate.clone());

    let dispatcher = OutboxDispatcher::new(config(num_workers), store.clone(), publisher.clone());
    let token = CancellationToken::new();
    let errors = dispatcher.run(token.clone());

    tokio::time::sleep(Duration::from_millis(200)).await;

    // The fetcher only ever asks for the queue's free space.
    let max_limit = store.max_fetch_limit.load(Ordering::SeqCst);
    assert!(
        max_limit as usize <= capacity,
        "fetch limit {max_limit} exceeded queue capacity {capacity}"
    );

    gate.add_permits(1000);
    token.cancel();
    drop(errors);
}

#[tokio::test]
async fn cancellation_stops_the_pipeline_promptly() {
    let store = MemoryStore::with_rows((1..=1000).map(message).collect());
    let publisher = MemoryPublisher::new();
    let dispatcher = OutboxDispatcher::new(config(3), store.clone(), publisher.clone());

    let token = CancellationToken::new();
    let mut errors = dispatcher.run(token.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    // The error stream closing means the fetcher and every worker exited.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while errors.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "pipeline should drain within the deadline");

    // Undelivered rows stay in the store for the next start.
    assert_eq!(
        store.remaining() + publisher.delivered_count(),
        1000,
        "every row is either still stored or was delivered exactly once"
    );
}
