use thiserror::Error;
use uuid::Uuid;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invoice {0} not found")]
    InvoiceNotFound(Uuid),

    #[error("unknown invoice status: {0}")]
    UnknownStatus(String),

    #[error("payload encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("all attempts failed")]
    AllAttemptsFailed,

    #[error("operation canceled")]
    Canceled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Connection-family failures are worth a bounded retry; everything
    /// else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Database(err) => match err {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
                _ => err
                    .as_database_error()
                    .and_then(|db| db.code())
                    // SQLSTATE class 08: connection exceptions
                    .map(|code| code.starts_with("08"))
                    .unwrap_or(false),
            },
            _ => false,
        }
    }
}

impl From<StorageError> for tonic::Status {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::InvoiceNotFound(_) => tonic::Status::not_found(err.to_string()),
            StorageError::UnknownStatus(_) => tonic::Status::invalid_argument(err.to_string()),
            StorageError::Canceled => tonic::Status::cancelled(err.to_string()),
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}
