//! Storage service: the single owner of the invoice database.
//!
//! Exposes three gRPC services over one Postgres schema: the writer gate's
//! `InvoiceStorage`, the dispatcher's `OutboxStorage` and the consumer's
//! `Validation`. Every state change that must reach the broker is written
//! together with its outbox row in one transaction.

pub mod config;
pub mod db;
pub mod error;
pub mod grpc;
pub mod metrics;
pub mod models;
pub mod repositories;
pub mod services;
