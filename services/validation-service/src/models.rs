use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Invoice as the validator sees it: integer money, fully hydrated items.
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

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub description: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Rejected,
}
