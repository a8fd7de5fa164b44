use chrono::Utc;
use event_schema::{InvoiceApproved, InvoiceRejected, Topic};
use resilience::RetrySchedule;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::db::{with_db_retry, TxManager, TxOptions};
use crate::error::StorageResult;
use crate::models::{Invoice, InvoiceStatus, OutboxStencil};
use crate::repositories::{InvoiceRepo, OutboxRepo};

/// Consumer-facing storage: read an invoice for validation and record the
/// decision. The status write mirrors the writer gate's contract: one
/// transaction covering both the update and the result event's outbox row.
pub struct ValidationService {
    tm: TxManager,
    invoices: InvoiceRepo,
    outbox: OutboxRepo,
    token: CancellationToken,
    retry: RetrySchedule,
}

impl ValidationService {
    pub fn new(
        tm: TxManager,
        invoices: InvoiceRepo,
        outbox: OutboxRepo,
        token: CancellationToken,
        retry: RetrySchedule,
    ) -> Self {
        Self {
            tm,
            invoices,
            outbox,
            token,
            retry,
        }
    }

    /// Read-only snapshot at Serializable isolation, so the line items can
    /// never phantom against their parent row.
    pub async fn get(&self, id: Uuid) -> StorageResult<(Invoice, InvoiceStatus)> {
        let tm = &self.tm;
        let invoices = self.invoices;

        with_db_retry(&self.token, &self.retry, || async move {
            tm.with_tx_opts(TxOptions::serializable_read_only(), move |tx| {
                Box::pin(async move { invoices.get(tx, id).await })
            })
            .await
        })
        .await
    }

    pub async fn set_approved(&self, id: Uuid) -> StorageResult<()> {
        let payload = serde_json::to_vec(&InvoiceApproved { id })?;
        self.set_status(id, InvoiceStatus::Approved, Topic::InvoiceApproved, payload)
            .await
    }

    pub async fn set_rejected(&self, id: Uuid) -> StorageResult<()> {
        let payload = serde_json::to_vec(&InvoiceRejected { id })?;
        self.set_status(id, InvoiceStatus::Rejected, Topic::InvoiceRejected, payload)
            .await
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        topic: Topic,
        payload: Vec<u8>,
    ) -> StorageResult<()> {
        let stencil = OutboxStencil { topic, payload };

        let tm = &self.tm;
        let invoices = self.invoices;

        with_db_retry(&self.token, &self.retry, || {
            let stencil = stencil.clone();
            let outbox = self.outbox.clone();
            async move {
                tm.with_tx(move |tx| {
                    Box::pin(async move {
                        invoices.set_status(tx, id, status).await?;
                        outbox.schedule(tx, &stencil, Utc::now()).await?;
                        Ok(())
                    })
                })
                .await
            }
        })
        .await?;

        info!(invoice_id = %id, status = %status, "validation decision recorded");

        Ok(())
    }
}
