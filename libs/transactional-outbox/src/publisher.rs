use std::time::Duration;

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{OutboxError, OutboxResult};
use crate::MessagePublisher;

const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_secs(30);

/// Synchronous per-message wrapper around the async Kafka producer.
///
/// Each `send` hands the message to the producer and awaits its delivery
/// future, so a returned `Ok` means the broker acknowledged the message.
/// Batching happens inside librdkafka at the socket layer; there is no
/// batching across callers here.
pub struct KafkaPublisher {
    producer: FutureProducer,
    queue_timeout: Timeout,
}

impl KafkaPublisher {
    pub fn connect(bootstrap: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .create()?;
        Ok(Self::new(producer))
    }

    pub fn new(producer: FutureProducer) -> Self {
        Self {
            producer,
            queue_timeout: Timeout::After(DEFAULT_QUEUE_TIMEOUT),
        }
    }
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn send(
        &self,
        token: &CancellationToken,
        topic: &str,
        payload: &[u8],
    ) -> OutboxResult<()> {
        let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(topic).payload(payload);
        let delivery = self.producer.send(record, self.queue_timeout);

        tokio::select! {
            _ = token.cancelled() => Err(OutboxError::Canceled),
            result = delivery => match result {
                Ok((partition, offset)) => {
                    debug!(topic, partition, offset, "message delivered");
                    Ok(())
                }
                Err((err, _)) => Err(OutboxError::Publish(err.to_string())),
            },
        }
    }
}
