use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use invoice_proto::outbox_storage_client::OutboxStorageClient;
use invoice_proto::{DeleteMessageRequest, GetMessagesRequest};
use tonic::transport::Channel;
use transactional_outbox::{OutboxMessage, OutboxStore};

/// gRPC adapter for the storage service's `OutboxStorage`, plugged into
/// the dispatcher as its store.
pub struct StorageClient {
    client: OutboxStorageClient<Channel>,
}

impl StorageClient {
    /// Connections are established lazily on the first call.
    pub fn connect(address: String) -> anyhow::Result<Self> {
        let channel = Channel::from_shared(address)?.connect_lazy();
        Ok(Self {
            client: OutboxStorageClient::new(channel),
        })
    }
}

#[async_trait]
impl OutboxStore for StorageClient {
    async fn fetch(
        &self,
        max_count: i32,
        retry_in: Duration,
    ) -> anyhow::Result<Vec<OutboxMessage>> {
        let request = GetMessagesRequest {
            max_count,
            retry_after_seconds: retry_in.as_secs() as i64,
        };

        let response = self
            .client
            .clone()
            .get_messages(request)
            .await
            .context("failed to get outbox messages")?
            .into_inner();

        Ok(response
            .messages
            .into_iter()
            .map(|msg| OutboxMessage {
                id: msg.id,
                topic: msg.topic,
                payload: msg.payload,
            })
            .collect())
    }

    async fn delete(&self, id: i64) -> anyhow::Result<()> {
        self.client
            .clone()
            .delete_message(DeleteMessageRequest { id })
            .await
            .context("failed to delete outbox message")?;
        Ok(())
    }
}
