use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::models::Invoice;

/// The validation policy slot. The decision body is deliberately a stub;
/// the pipeline around it is what carries the correctness guarantees.
#[async_trait]
pub trait InvoiceValidator: Send + Sync {
    async fn validate(&self, invoice: &Invoice) -> bool;
}

const APPROVE_PROBABILITY: f64 = 0.9;
const MAX_DECISION_DELAY_MS: u64 = 5_000;

/// Stand-in validator: think for a random moment, then approve with fixed
/// probability.
pub struct RandomValidator;

impl RandomValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RandomValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvoiceValidator for RandomValidator {
    async fn validate(&self, _invoice: &Invoice) -> bool {
        let (delay_ms, approved) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_range(0..MAX_DECISION_DELAY_MS),
                rng.gen_bool(APPROVE_PROBABILITY),
            )
        };
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        approved
    }
}
