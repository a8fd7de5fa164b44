mod retry;
mod tx;

pub use retry::with_db_retry;
pub use tx::{IsolationLevel, TxManager, TxOptions};
