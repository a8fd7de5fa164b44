//! Wire-facing invoice shapes and the decimal boundary.
//!
//! Amounts travel as decimals on HTTP and as integers in minor units
//! (scale 1000) everywhere behind the gate. The multiply/divide happens
//! here and nowhere else.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

const AMOUNT_SCALE: i64 = 1000;

/// Invoice as submitted and returned over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceJson {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<ItemJson>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemJson {
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// Invoice behind the gate: integer money, ready for the storage RPC.
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

pub fn to_minor_units(value: Decimal) -> Result<i64, ApiError> {
    value
        .checked_mul(Decimal::from(AMOUNT_SCALE))
        .map(|scaled| scaled.trunc())
        .and_then(|scaled| scaled.to_i64())
        .ok_or(ApiError::AmountOverflow)
}

pub fn from_minor_units(value: i64) -> Decimal {
    Decimal::new(value, 3)
}

impl InvoiceJson {
    pub fn into_domain(self) -> Result<Invoice, ApiError> {
        Ok(Invoice {
            id: self.id,
            customer_id: self.customer_id,
            amount: to_minor_units(self.amount)?,
            currency: self.currency,
            due_date: self.due_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: self
                .items
                .into_iter()
                .map(ItemJson::into_domain)
                .collect::<Result<_, _>>()?,
            notes: self.notes,
        })
    }
}

impl ItemJson {
    fn into_domain(self) -> Result<Item, ApiError> {
        Ok(Item {
            description: self.description,
            quantity: self.quantity,
            unit_price: to_minor_units(self.unit_price)?,
            total: to_minor_units(self.total)?,
        })
    }
}

impl Invoice {
    pub fn into_wire(self) -> InvoiceJson {
        InvoiceJson {
            id: self.id,
            customer_id: self.customer_id,
            amount: from_minor_units(self.amount),
            currency: self.currency,
            due_date: self.due_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: self.items.into_iter().map(Item::into_wire).collect(),
            notes: self.notes,
        }
    }
}

impl Item {
    fn into_wire(self) -> ItemJson {
        ItemJson {
            description: self.description,
            quantity: self.quantity,
            unit_price: from_minor_units(self.unit_price),
            total: from_minor_units(self.total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn decimal_amounts_scale_up_by_one_thousand() {
        assert_eq!(to_minor_units(Decimal::from_str("12.5").unwrap()).unwrap(), 12_500);
        assert_eq!(to_minor_units(Decimal::from_str("0.001").unwrap()).unwrap(), 1);
        assert_eq!(to_minor_units(Decimal::from(7)).unwrap(), 7_000);
        // Sub-scale precision truncates rather than rounds.
        assert_eq!(to_minor_units(Decimal::from_str("0.0019").unwrap()).unwrap(), 1);
    }

    #[test]
    fn minor_units_scale_back_down() {
        assert_eq!(from_minor_units(12_500), Decimal::from_str("12.500").unwrap());
        assert_eq!(from_minor_units(1), Decimal::from_str("0.001").unwrap());
    }

    #[test]
    fn overflowing_amount_is_rejected() {
        let too_big = Decimal::MAX;
        assert!(matches!(
            to_minor_units(too_big),
            Err(ApiError::AmountOverflow)
        ));
    }

    #[test]
    fn ingress_egress_is_lossless_at_scale_three() {
        let wire = InvoiceJson {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            amount: Decimal::from_str("12.500").unwrap(),
            currency: "USD".into(),
            due_date: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![ItemJson {
                description: "consulting".into(),
                quantity: 2,
                unit_price: Decimal::from_str("6.250").unwrap(),
                total: Decimal::from_str("12.500").unwrap(),
            }],
            notes: "net 30".into(),
        };

        let domain = wire.clone().into_domain().unwrap();
        assert_eq!(domain.amount, 12_500);
        assert_eq!(domain.items[0].unit_price, 6_250);

        let back = domain.into_wire();
        assert_eq!(back.amount, wire.amount);
        assert_eq!(back.items[0].total, wire.items[0].total);
    }
}
