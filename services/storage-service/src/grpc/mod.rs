//! tonic servers for the storage contract and the proto⇄model conversions
//! they share.

mod invoice_server;
mod outbox_server;
mod validation_server;

pub use invoice_server::InvoiceServer;
pub use outbox_server::OutboxServer;
pub use validation_server::ValidationServer;

use invoice_proto as pb;
use tonic::Status;

use crate::models::{Invoice, InvoiceStatus, Item};

pub(crate) fn invoice_from_proto(invoice: pb::Invoice) -> Result<Invoice, Status> {
    let id = invoice
        .id
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("missing invoice id"))?;
    let customer_id = invoice
        .customer_id
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("missing customer id"))?;

    Ok(Invoice {
        id: pb::uuid_from_proto(id).map_err(invalid)?,
        customer_id: pb::uuid_from_proto(customer_id).map_err(invalid)?,
        amount: invoice.amount,
        currency: invoice.currency,
        due_date: pb::timestamp_from_proto(invoice.due_date).map_err(invalid)?,
        created_at: pb::timestamp_from_proto(invoice.created_at).map_err(invalid)?,
        updated_at: pb::timestamp_from_proto(invoice.updated_at).map_err(invalid)?,
        items: invoice.items.into_iter().map(item_from_proto).collect(),
        notes: invoice.notes,
    })
}

pub(crate) fn invoice_to_proto(invoice: Invoice) -> pb::Invoice {
    pb::Invoice {
        id: Some(pb::uuid_to_proto(invoice.id)),
        customer_id: Some(pb::uuid_to_proto(invoice.customer_id)),
        amount: invoice.amount,
        currency: invoice.currency,
        due_date: pb::timestamp_to_proto(invoice.due_date),
        created_at: pb::timestamp_to_proto(invoice.created_at),
        updated_at: pb::timestamp_to_proto(invoice.updated_at),
        items: invoice.items.into_iter().map(item_to_proto).collect(),
        notes: invoice.notes,
    }
}

fn item_from_proto(item: pb::Item) -> Item {
    Item {
        description: item.description,
        quantity: item.quantity,
        unit_price: item.unit_price,
        total: item.total,
    }
}

fn item_to_proto(item: Item) -> pb::Item {
    pb::Item {
        description: item.description,
        quantity: item.quantity,
        unit_price: item.unit_price,
        total: item.total,
    }
}

pub(crate) fn status_to_proto(status: InvoiceStatus) -> pb::InvoiceStatus {
    match status {
        InvoiceStatus::Pending => pb::InvoiceStatus::Pending,
        InvoiceStatus::Approved => pb::InvoiceStatus::Approved,
        InvoiceStatus::Rejected => pb::InvoiceStatus::Rejected,
    }
}

pub(crate) fn parse_uuid(id: Option<&pb::Uuid>) -> Result<uuid::Uuid, Status> {
    let id = id.ok_or_else(|| Status::invalid_argument("missing id"))?;
    pb::uuid_from_proto(id).map_err(invalid)
}

fn invalid(err: pb::WireError) -> Status {
    Status::invalid_argument(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn invoice_survives_a_proto_round_trip() {
        let invoice = Invoice {
            id: uuid::Uuid::new_v4(),
            customer_id: uuid::Uuid::new_v4(),
            amount: 12_500,
            currency: "USD".into(),
            due_date: chrono::Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap(),
            created_at: chrono::Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap(),
            updated_at: chrono::Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap(),
            items: vec![Item {
                description: "consulting".into(),
                quantity: 2,
                unit_price: 6_250,
                total: 12_500,
            }],
            notes: "net 30".into(),
        };

        let restored = invoice_from_proto(invoice_to_proto(invoice.clone())).unwrap();
        assert_eq!(restored, invoice);
    }

    #[test]
    fn missing_invoice_id_is_invalid_argument() {
        let proto = pb::Invoice {
            id: None,
            ..invoice_to_proto(Invoice {
                id: uuid::Uuid::new_v4(),
                customer_id: uuid::Uuid::new_v4(),
                amount: 0,
                currency: "USD".into(),
                due_date: chrono::Utc::now(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
                items: vec![],
                notes: String::new(),
            })
        };

        let err = invoice_from_proto(proto).unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
