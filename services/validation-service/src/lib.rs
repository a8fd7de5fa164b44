//! Validation service: the consumer end of the invoice pipeline.
//!
//! Polls `new_invoice`, re-reads the authoritative invoice over the storage
//! RPC, runs the validation policy and records the decision. Offsets are
//! committed only after the decision is durably stored; redeliveries are
//! absorbed by the pending-status guard.

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod models;
pub mod storage;
pub mod validator;
