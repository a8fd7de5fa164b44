use std::time::Duration;

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use thiserror::Error;
use tracing::info;

use crate::TopicSettings;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to create admin client: {0}")]
    AdminClient(#[source] KafkaError),
    #[error("create topics request failed: {0}")]
    Request(#[source] KafkaError),
    #[error("failed to create topic {topic}: {code}")]
    Topic {
        topic: String,
        code: RDKafkaErrorCode,
    },
}

/// Ensure every topic in `settings` exists on the broker.
///
/// Called by each producing service at startup. A topic that already
/// exists counts as success, so concurrent service starts do not race.
pub async fn ensure_topics(bootstrap: &str, settings: &[TopicSettings]) -> Result<(), SetupError> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", bootstrap)
        .create()
        .map_err(SetupError::AdminClient)?;

    let topics: Vec<NewTopic<'_>> = settings
        .iter()
        .map(|s| {
            NewTopic::new(
                s.topic.as_str(),
                s.partitions,
                TopicReplication::Fixed(s.replication),
            )
        })
        .collect();

    let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(5)));
    let results = admin
        .create_topics(topics.iter(), &opts)
        .await
        .map_err(SetupError::Request)?;

    for result in results {
        match result {
            Ok(topic) => info!(topic = %topic, "topic created"),
            Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                info!(topic = %topic, "topic already exists");
            }
            Err((topic, code)) => return Err(SetupError::Topic { topic, code }),
        }
    }

    Ok(())
}
