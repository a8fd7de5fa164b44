use thiserror::Error;

pub type ValidationResult<T> = Result<T, ValidationError>;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("failed to decode event payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("storage call failed: {0}")]
    Storage(#[from] tonic::Status),

    #[error("invalid wire data: {0}")]
    Wire(#[from] invoice_proto::WireError),

    #[error("response missing field: {0}")]
    MissingField(&'static str),

    #[error("operation canceled")]
    Canceled,
}
