use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::warn;

use crate::error::StorageResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    Serializable,
}

/// Options for [`TxManager::with_tx_opts`]. The default leaves the store's
/// own isolation level in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn serializable_read_only() -> Self {
        Self {
            isolation: Some(IsolationLevel::Serializable),
            read_only: true,
        }
    }
}

/// Closure-based transaction boundary.
///
/// Acquires a connection, begins a transaction, hands the live handle to
/// the closure, commits on `Ok` and rolls back on `Err`. Dropping the
/// transaction on any other exit path also rolls back, so release is
/// guaranteed.
#[derive(Clone)]
pub struct TxManager {
    pool: PgPool,
}

impl TxManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn with_tx<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> BoxFuture<'c, StorageResult<T>>,
    {
        self.run(TxOptions::default(), f).await
    }

    pub async fn with_tx_opts<T, F>(&self, opts: TxOptions, f: F) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> BoxFuture<'c, StorageResult<T>>,
    {
        self.run(opts, f).await
    }

    async fn run<T, F>(&self, opts: TxOptions, f: F) -> StorageResult<T>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> BoxFuture<'c, StorageResult<T>>,
    {
        let mut tx = self.pool.begin().await?;

        if let Some(sql) = transaction_mode_sql(&opts) {
            sqlx::query(sql).execute(&mut *tx).await?;
        }

        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// `SET TRANSACTION` must be the first statement inside the transaction.
fn transaction_mode_sql(opts: &TxOptions) -> Option<&'static str> {
    match (opts.isolation, opts.read_only) {
        (Some(IsolationLevel::Serializable), true) => {
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE READ ONLY")
        }
        (Some(IsolationLevel::Serializable), false) => {
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        }
        (None, true) => Some("SET TRANSACTION READ ONLY"),
        (None, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_mode_sql_covers_all_option_shapes() {
        assert_eq!(transaction_mode_sql(&TxOptions::default()), None);
        assert_eq!(
            transaction_mode_sql(&TxOptions::serializable_read_only()),
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE READ ONLY")
        );
        assert_eq!(
            transaction_mode_sql(&TxOptions {
                isolation: Some(IsolationLevel::Serializable),
                read_only: false
            }),
            Some("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        );
        assert_eq!(
            transaction_mode_sql(&TxOptions {
                isolation: None,
                read_only: true
            }),
            Some("SET TRANSACTION READ ONLY")
        );
    }
}
