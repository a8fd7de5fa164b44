use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{Invoice, InvoiceStatus, Item};

/// Row-level access to `invoices` and `invoice_items`. Every method runs
/// inside a caller-owned transaction.
#[derive(Clone, Copy)]
pub struct InvoiceRepo;

impl InvoiceRepo {
    pub fn new() -> Self {
        Self
    }

    pub async fn add(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        invoice: &Invoice,
        status: InvoiceStatus,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, customer_id, amount, currency, due_date, created_at, updated_at, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.customer_id)
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(invoice.due_date)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .bind(&invoice.notes)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;

        for item in &invoice.items {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, total)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(invoice.id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    pub async fn get(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
    ) -> StorageResult<(Invoice, InvoiceStatus)> {
        let row = sqlx::query(
            r#"
            SELECT customer_id, amount, currency, due_date, created_at, updated_at, notes, status
            FROM invoices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StorageError::InvoiceNotFound(id))?;

        let status = InvoiceStatus::parse(row.try_get::<String, _>("status")?.as_str())?;

        let item_rows = sqlx::query(
            r#"
            SELECT description, quantity, unit_price, total
            FROM invoice_items
            WHERE invoice_id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut **tx)
        .await?;

        let items = item_rows
            .into_iter()
            .map(|item| {
                Ok(Item {
                    description: item.try_get("description")?,
                    quantity: item.try_get("quantity")?,
                    unit_price: item.try_get("unit_price")?,
                    total: item.try_get("total")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        let invoice = Invoice {
            id,
            customer_id: row.try_get("customer_id")?,
            amount: row.try_get("amount")?,
            currency: row.try_get("currency")?,
            due_date: row.try_get("due_date")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            items,
            notes: row.try_get("notes")?,
        };

        Ok((invoice, status))
    }

    pub async fn set_status(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: Uuid,
        status: InvoiceStatus,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET status = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::InvoiceNotFound(id));
        }

        Ok(())
    }
}

impl Default for InvoiceRepo {
    fn default() -> Self {
        Self::new()
    }
}
