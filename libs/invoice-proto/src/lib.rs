//! Generated gRPC bindings for the storage contract plus the byte-level
//! conversions every peer needs: 16-byte UUID arrays and seconds-since-epoch
//! timestamps.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod storage {
    tonic::include_proto!("invoice.storage.v1");
}

pub use storage::*;

/// Conversion failures between wire values and domain values.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("invalid uuid bytes: expected 16, got {0}")]
    InvalidUuidBytes(usize),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid invoice status: {0}")]
    InvalidStatus(i32),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

pub fn uuid_to_proto(id: uuid::Uuid) -> Uuid {
    Uuid {
        value: id.as_bytes().to_vec(),
    }
}

pub fn uuid_from_proto(id: &Uuid) -> Result<uuid::Uuid, WireError> {
    uuid::Uuid::from_slice(&id.value).map_err(|_| WireError::InvalidUuidBytes(id.value.len()))
}

pub fn timestamp_to_proto(ts: DateTime<Utc>) -> i64 {
    ts.timestamp()
}

pub fn timestamp_from_proto(seconds: i64) -> Result<DateTime<Utc>, WireError> {
    DateTime::from_timestamp(seconds, 0).ok_or(WireError::InvalidTimestamp(seconds))
}
