use std::sync::Arc;
use std::time::Duration;

use invoice_proto::outbox_storage_server::OutboxStorage;
use invoice_proto::{
    DeleteMessageRequest, DeleteMessageResponse, GetMessagesRequest, GetMessagesResponse,
    OutboxMessage,
};
use tonic::{Request, Response, Status};

use crate::metrics::StorageMetrics;
use crate::services::OutboxService;

/// Serves the dispatcher: leased claims and post-ack deletes.
pub struct OutboxServer {
    outbox: Arc<OutboxService>,
    metrics: StorageMetrics,
}

impl OutboxServer {
    pub fn new(outbox: Arc<OutboxService>, metrics: StorageMetrics) -> Self {
        Self { outbox, metrics }
    }
}

#[tonic::async_trait]
impl OutboxStorage for OutboxServer {
    async fn get_messages(
        &self,
        request: Request<GetMessagesRequest>,
    ) -> Result<Response<GetMessagesResponse>, Status> {
        let req = request.into_inner();
        if req.max_count < 0 {
            return Err(Status::invalid_argument("max_count must not be negative"));
        }
        if req.retry_after_seconds <= 0 {
            return Err(Status::invalid_argument(
                "retry_after_seconds must be positive",
            ));
        }

        let rows = self
            .outbox
            .get(
                req.max_count,
                Duration::from_secs(req.retry_after_seconds as u64),
            )
            .await
            .map_err(Status::from)?;

        self.metrics.outbox_claimed.inc_by(rows.len() as u64);

        let messages = rows
            .into_iter()
            .map(|row| OutboxMessage {
                id: row.id,
                topic: row.topic,
                payload: row.payload,
            })
            .collect();

        Ok(Response::new(GetMessagesResponse { messages }))
    }

    async fn delete_message(
        &self,
        request: Request<DeleteMessageRequest>,
    ) -> Result<Response<DeleteMessageResponse>, Status> {
        let id = request.into_inner().id;
        self.outbox.delete(id).await.map_err(Status::from)?;
        self.metrics.outbox_deleted.inc();

        Ok(Response::new(DeleteMessageResponse {}))
    }
}
