mod invoice;
mod outbox;

pub use invoice::InvoiceRepo;
pub use outbox::OutboxRepo;
