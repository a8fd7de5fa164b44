use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageError;

/// A stored invoice. Monetary values are integers in minor units
/// (scale 1000).
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<Item>,
    pub notes: String,
}

/// A line item owned by exactly one invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub description: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub total: i64,
}

/// Invoice lifecycle. Transitions are monotone: Pending moves to exactly
/// one of the terminal states and terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Rejected,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "PENDING",
            InvoiceStatus::Approved => "APPROVED",
            InvoiceStatus::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, StorageError> {
        match value {
            "PENDING" => Ok(InvoiceStatus::Pending),
            "APPROVED" => Ok(InvoiceStatus::Approved),
            "REJECTED" => Ok(InvoiceStatus::Rejected),
            other => Err(StorageError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbox message before it has an identity: topic plus payload, ready
/// to be scheduled inside an application transaction.
#[derive(Debug, Clone)]
pub struct OutboxStencil {
    pub topic: event_schema::Topic,
    pub payload: Vec<u8>,
}

/// A claimed outbox row handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct OutboxRow {
    pub id: i64,
    pub topic: String,
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            InvoiceStatus::Pending,
            InvoiceStatus::Approved,
            InvoiceStatus::Rejected,
        ] {
            assert_eq!(InvoiceStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_text_is_rejected() {
        assert!(matches!(
            InvoiceStatus::parse("VOID"),
            Err(StorageError::UnknownStatus(_))
        ));
    }
}
