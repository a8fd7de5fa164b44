use async_trait::async_trait;
use invoice_proto as pb;
use invoice_proto::validation_client::ValidationClient;
use tonic::transport::Channel;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::metrics::ValidationMetrics;
use crate::models::{Invoice, InvoiceStatus, Item};

/// The slice of storage the validation loop consumes.
#[async_trait]
pub trait InvoiceStorage: Send + Sync {
    async fn get_invoice(&self, id: Uuid) -> ValidationResult<(Invoice, InvoiceStatus)>;
    async fn set_approved(&self, id: Uuid) -> ValidationResult<()>;
    async fn set_rejected(&self, id: Uuid) -> ValidationResult<()>;
}

/// gRPC adapter for the storage service's `Validation`.
pub struct StorageClient {
    client: ValidationClient<Channel>,
    metrics: ValidationMetrics,
}

impl StorageClient {
    /// Connections are established lazily on the first call.
    pub fn connect(address: String, metrics: ValidationMetrics) -> anyhow::Result<Self> {
        let channel = Channel::from_shared(address)?.connect_lazy();
        Ok(Self {
            client: ValidationClient::new(channel),
            metrics,
        })
    }
}

#[async_trait]
impl InvoiceStorage for StorageClient {
    async fn get_invoice(&self, id: Uuid) -> ValidationResult<(Invoice, InvoiceStatus)> {
        let request = pb::GetInvoiceRequest {
            id: Some(pb::uuid_to_proto(id)),
        };

        let response = self.client.clone().get_invoice(request).await?.into_inner();

        let invoice = response
            .invoice
            .ok_or(ValidationError::MissingField("invoice"))?;

        Ok((invoice_from_proto(invoice)?, status_from_proto(response.status)?))
    }

    async fn set_approved(&self, id: Uuid) -> ValidationResult<()> {
        let request = pb::SetApprovedRequest {
            id: Some(pb::uuid_to_proto(id)),
        };
        self.client.clone().set_approved(request).await?;
        self.metrics.handled.with_label_values(&["approved"]).inc();
        debug!(invoice_id = %id, "invoice approved in storage");
        Ok(())
    }

    async fn set_rejected(&self, id: Uuid) -> ValidationResult<()> {
        let request = pb::SetRejectedRequest {
            id: Some(pb::uuid_to_proto(id)),
        };
        self.client.clone().set_rejected(request).await?;
        self.metrics.handled.with_label_values(&["rejected"]).inc();
        debug!(invoice_id = %id, "invoice rejected in storage");
        Ok(())
    }
}

fn invoice_from_proto(invoice: pb::Invoice) -> ValidationResult<Invoice> {
    let id = invoice
        .id
        .as_ref()
        .ok_or(ValidationError::MissingField("id"))?;
    let customer_id = invoice
        .customer_id
        .as_ref()
        .ok_or(ValidationError::MissingField("customer_id"))?;

    Ok(Invoice {
        id: pb::uuid_from_proto(id)?,
        customer_id: pb::uuid_from_proto(customer_id)?,
        amount: invoice.amount,
        currency: invoice.currency,
        due_date: pb::timestamp_from_proto(invoice.due_date)?,
        created_at: pb::timestamp_from_proto(invoice.created_at)?,
        updated_at: pb::timestamp_from_proto(invoice.updated_at)?,
        items: invoice
            .items
            .into_iter()
            .map(|item| Item {
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
            })
            .collect(),
        notes: invoice.notes,
    })
}

fn status_from_proto(status: i32) -> ValidationResult<InvoiceStatus> {
    match pb::InvoiceStatus::try_from(status) {
        Ok(pb::InvoiceStatus::Pending) => Ok(InvoiceStatus::Pending),
        Ok(pb::InvoiceStatus::Approved) => Ok(InvoiceStatus::Approved),
        Ok(pb::InvoiceStatus::Rejected) => Ok(InvoiceStatus::Rejected),
        Ok(pb::InvoiceStatus::Unspecified) | Err(_) => Err(ValidationError::Wire(
            pb::WireError::InvalidStatus(status),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_statuses_map_to_domain() {
        assert_eq!(
            status_from_proto(pb::InvoiceStatus::Pending as i32).unwrap(),
            InvoiceStatus::Pending
        );
        assert!(status_from_proto(pb::InvoiceStatus::Unspecified as i32).is_err());
        assert!(status_from_proto(42).is_err());
    }
}
