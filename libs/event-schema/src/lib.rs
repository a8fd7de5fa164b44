//! Broker topic catalogue and event payload schemas.
//!
//! Events are thin: they carry only the invoice identifier and consumers
//! re-read authoritative state over the storage RPC. Payloads are JSON so
//! any service can decode them without the proto toolchain.

mod setup;

pub use setup::{ensure_topics, SetupError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every topic the pipeline produces to or consumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    NewInvoice,
    InvoiceApproved,
    InvoiceRejected,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::NewInvoice => "new_invoice",
            Topic::InvoiceApproved => "invoice_approved",
            Topic::InvoiceRejected => "invoice_rejected",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partitioning and replication for a topic, applied at provisioning time.
#[derive(Debug, Clone, Copy)]
pub struct TopicSettings {
    pub topic: Topic,
    pub partitions: i32,
    pub replication: i32,
}

/// All topics with their broker-side settings.
pub const TOPICS: [TopicSettings; 3] = [
    TopicSettings {
        topic: Topic::NewInvoice,
        partitions: 6,
        replication: 3,
    },
    TopicSettings {
        topic: Topic::InvoiceApproved,
        partitions: 6,
        replication: 3,
    },
    TopicSettings {
        topic: Topic::InvoiceRejected,
        partitions: 6,
        replication: 3,
    },
];

/// Payload of `new_invoice`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewInvoice {
    pub id: Uuid,
}

/// Payload of `invoice_approved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceApproved {
    pub id: Uuid,
}

/// Payload of `invoice_rejected`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvoiceRejected {
    pub id: Uuid,
}
