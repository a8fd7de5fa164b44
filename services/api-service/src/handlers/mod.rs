mod invoice;

pub use invoice::{register_routes, InvoiceStorageGate};
