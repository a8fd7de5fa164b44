use chrono::Utc;
use event_schema::{NewInvoice, Topic};
use resilience::RetrySchedule;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::db::{with_db_retry, TxManager};
use crate::error::StorageResult;
use crate::models::{Invoice, InvoiceStatus, OutboxStencil};
use crate::repositories::{InvoiceRepo, OutboxRepo};

/// Writer-gate storage: persists a submitted invoice together with its
/// `new_invoice` outbox message in one transaction.
pub struct InvoiceService {
    tm: TxManager,
    invoices: InvoiceRepo,
    outbox: OutboxRepo,
    token: CancellationToken,
    retry: RetrySchedule,
}

impl InvoiceService {
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

    /// Insert the invoice (status Pending), its items, and one outbox row
    /// eligible immediately. Any failure rolls back the whole set: no
    /// invoice without its outbox message, no message without its invoice.
    pub async fn add_new(&self, invoice: &Invoice) -> StorageResult<()> {
        let payload = serde_json::to_vec(&NewInvoice { id: invoice.id })?;
        let stencil = OutboxStencil {
            topic: Topic::NewInvoice,
            payload,
        };

        let tm = &self.tm;
        let invoices = self.invoices;

        with_db_retry(&self.token, &self.retry, || {
            let invoice = invoice.clone();
            let stencil = stencil.clone();
            let outbox = self.outbox.clone();
            async move {
                tm.with_tx(move |tx| {
                    Box::pin(async move {
                        invoices.add(tx, &invoice, InvoiceStatus::Pending).await?;
                        outbox.schedule(tx, &stencil, Utc::now()).await?;
                        Ok(())
                    })
                })
                .await
            }
        })
        .await?;

        info!(invoice_id = %invoice.id, "invoice stored and queued for dispatch");

        Ok(())
    }
}
