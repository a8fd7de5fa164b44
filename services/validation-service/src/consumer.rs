use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use resilience::{RetryError, RetrySchedule};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ValidationError, ValidationResult};
use crate::metrics::ValidationMetrics;

const CONSUMER_GROUP_ID: &str = "validation-service";

/// The slice of the broker the validation loop consumes.
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Wait up to the poll timeout for the next message payload. `None`
    /// means nothing arrived, which is not an error.
    async fn poll(&self) -> ValidationResult<Option<Vec<u8>>>;

    /// Commit the consumed offsets. Retries forever: losing an offset is
    /// worse than a stuck consumer.
    async fn commit(&self, token: &CancellationToken) -> ValidationResult<()>;
}

/// Manual-commit Kafka consumer subscribed to `new_invoice`.
///
/// Auto-commit is disabled; offsets advance only after the validation
/// decision is durably stored.
pub struct InvoiceConsumer {
    consumer: StreamConsumer,
    poll_timeout: Duration,
    commit_schedule: RetrySchedule,
    metrics: ValidationMetrics,
}

impl InvoiceConsumer {
    pub fn new(
        bootstrap: &str,
        poll_timeout: Duration,
        commit_delays: Vec<Duration>,
        metrics: ValidationMetrics,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap)
            .set("group.id", CONSUMER_GROUP_ID)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()?;

        consumer.subscribe(&[event_schema::Topic::NewInvoice.as_str()])?;

        Ok(Self {
            consumer,
            poll_timeout,
            commit_schedule: RetrySchedule::infinite(commit_delays),
            metrics,
        })
    }
}

#[async_trait]
impl MessageConsumer for InvoiceConsumer {
    async fn poll(&self) -> ValidationResult<Option<Vec<u8>>> {
        match tokio::time::timeout(self.poll_timeout, self.consumer.recv()).await {
            // Poll timeout elapsed: no message, carry on.
            Err(_) => Ok(None),
            Ok(Err(err)) => Err(ValidationError::Broker(err.to_string())),
            Ok(Ok(message)) => {
                self.metrics.consumed.inc();
                debug!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "received message"
                );
                // A message without a payload carries nothing to validate.
                Ok(message.payload().map(|p| p.to_vec()))
            }
        }
    }

    async fn commit(&self, token: &CancellationToken) -> ValidationResult<()> {
        let result = resilience::retry_with(
            token,
            &self.commit_schedule,
            || async {
                self.consumer
                    .commit_consumer_state(CommitMode::Sync)
                    .map_err(|err| ValidationError::Broker(err.to_string()))
            },
            |err| {
                self.metrics.commit_retries.inc();
                warn!(error = %err, "offset commit failed, retrying");
                true
            },
        )
        .await;

        match result {
            Ok(()) => {
                debug!("offsets committed");
                Ok(())
            }
            Err(RetryError::Canceled) => Err(ValidationError::Canceled),
            // Unreachable with an infinite schedule and an always-true
            // predicate, but the types require it.
            Err(RetryError::AllAttemptsFailed) => {
                Err(ValidationError::Broker("all commit attempts failed".into()))
            }
            Err(RetryError::Rejected(err)) => Err(err),
        }
    }
}
