use async_trait::async_trait;
use invoice_proto as pb;
use invoice_proto::invoice_storage_client::InvoiceStorageClient;
use tonic::transport::Channel;
use tonic::Status;
use tracing::info;
use uuid::Uuid;

use crate::dto::{Invoice, Item};
use crate::error::{ApiError, ApiResult};
use crate::handlers::InvoiceStorageGate;

/// gRPC adapter for the storage service's `InvoiceStorage`.
pub struct StorageClient {
    client: InvoiceStorageClient<Channel>,
}

impl StorageClient {
    /// Connections are established lazily on the first call.
    pub fn connect(address: String) -> anyhow::Result<Self> {
        let channel = Channel::from_shared(address)?.connect_lazy();
        Ok(Self {
            client: InvoiceStorageClient::new(channel),
        })
    }
}

#[async_trait]
impl InvoiceStorageGate for StorageClient {
    async fn upload(&self, invoice: Invoice) -> ApiResult<()> {
        let id = invoice.id;
        let request = pb::UploadRequest {
            invoice: Some(invoice_to_proto(invoice)),
        };

        self.client.clone().upload(request).await?;
        info!(invoice_id = %id, "invoice uploaded to storage");

        Ok(())
    }

    async fn get(&self, id: Uuid) -> ApiResult<(Invoice, String)> {
        let request = pb::GetRequest {
            id: Some(pb::uuid_to_proto(id)),
        };

        let response = self.client.clone().get(request).await?.into_inner();

        let invoice = response
            .invoice
            .ok_or_else(|| ApiError::Storage(Status::internal("response missing invoice")))?;
        let status = status_from_proto(response.status)?;

        Ok((invoice_from_proto(invoice)?, status))
    }
}

fn invoice_to_proto(invoice: Invoice) -> pb::Invoice {
    pb::Invoice {
        id: Some(pb::uuid_to_proto(invoice.id)),
        customer_id: Some(pb::uuid_to_proto(invoice.customer_id)),
        amount: invoice.amount,
        currency: invoice.currency,
        due_date: pb::timestamp_to_proto(invoice.due_date),
        created_at: pb::timestamp_to_proto(invoice.created_at),
        updated_at: pb::timestamp_to_proto(invoice.updated_at),
        items: invoice
            .items
            .into_iter()
            .map(|item| pb::Item {
                description: item.description,
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.total,
            })
            .collect(),
        notes: invoice.notes,
    }
}

fn invoice_from_proto(invoice: pb::Invoice) -> ApiResult<Invoice> {
    let missing = |field| ApiError::Storage(Status::internal(format!("missing {field}")));
    let bad_wire =
        |e: pb::WireError| ApiError::Storage(Status::internal(format!("invalid wire data: {e}")));

    Ok(Invoice {
        id: pb::uuid_from_proto(invoice.id.as_ref().ok_or_else(|| missing("id"))?)
            .map_err(bad_wire)?,
        customer_id: pb::uuid_from_proto(
            invoice.customer_id.as_ref().ok_or_else(|| missing("customer_id"))?,
        )
        .map_err(bad_wire)?,
        amount: invoice.amount,
        currency: invoice.currency,
        due_date: pb::timestamp_from_proto(invoice.due_date).map_err(bad_wire)?,
        created_at: pb::timestamp_from_proto(invoice.created_at).map_err(bad_wire)?,
        updated_at: pb::timestamp_from_proto(invoice.updated_at).map_err(bad_wire)?,
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

fn status_from_proto(status: i32) -> ApiResult<String> {
    let status = pb::InvoiceStatus::try_from(status)
        .map_err(|_| ApiError::Storage(Status::internal("invalid invoice status")))?;
    let name = match status {
        pb::InvoiceStatus::Pending => "PENDING",
        pb::InvoiceStatus::Approved => "APPROVED",
        pb::InvoiceStatus::Rejected => "REJECTED",
        pb::InvoiceStatus::Unspecified => {
            return Err(ApiError::Storage(Status::internal(
                "unspecified invoice status",
            )))
        }
    };
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_map_to_wire_names() {
        assert_eq!(
            status_from_proto(pb::InvoiceStatus::Pending as i32).unwrap(),
            "PENDING"
        );
        assert_eq!(
            status_from_proto(pb::InvoiceStatus::Approved as i32).unwrap(),
            "APPROVED"
        );
        assert_eq!(
            status_from_proto(pb::InvoiceStatus::Rejected as i32).unwrap(),
            "REJECTED"
        );
    }

    #[test]
    fn unspecified_status_is_an_error() {
        assert!(status_from_proto(pb::InvoiceStatus::Unspecified as i32).is_err());
        assert!(status_from_proto(99).is_err());
    }
}
