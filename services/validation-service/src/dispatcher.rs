use event_schema::NewInvoice;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::consumer::MessageConsumer;
use crate::error::{ValidationError, ValidationResult};
use crate::models::InvoiceStatus;
use crate::storage::InvoiceStorage;
use crate::validator::InvoiceValidator;

/// Capacity of the error stream returned by [`ValidationLoop::run`].
const ERROR_STREAM_CAPACITY: usize = 16;

/// Single-threaded poll loop: read a thin event, fetch the invoice,
/// validate, write the decision, commit the offset.
///
/// The offset commit strictly follows the status write, so a crash between
/// the two causes a redelivery; the `status != Pending` guard absorbs it.
pub struct ValidationLoop<C, S, V> {
    consumer: C,
    storage: S,
    validator: V,
}

impl<C, S, V> ValidationLoop<C, S, V>
where
    C: MessageConsumer + 'static,
    S: InvoiceStorage + 'static,
    V: InvoiceValidator + 'static,
{
    pub fn new(consumer: C, storage: S, validator: V) -> Self {
        Self {
            consumer,
            storage,
            validator,
        }
    }

    /// Run until cancellation, surfacing survivable errors on the returned
    /// stream. An erroring message is not committed and will redeliver.
    pub fn run(self, token: CancellationToken) -> mpsc::Receiver<ValidationError> {
        let (err_tx, err_rx) = mpsc::channel(ERROR_STREAM_CAPACITY);

        tokio::spawn(async move {
            info!("validation loop starting");

            loop {
                if token.is_cancelled() {
                    break;
                }

                match self.tick(&token).await {
                    Ok(()) => {}
                    Err(ValidationError::Canceled) => break,
                    Err(err) => {
                        let _ = err_tx.send(err).await;
                    }
                }
            }

            info!("validation loop finished");
        });

        err_rx
    }

    pub async fn tick(&self, token: &CancellationToken) -> ValidationResult<()> {
        let Some(payload) = self.consumer.poll().await? else {
            return Ok(());
        };

        self.handle_message(&payload).await?;
        self.consumer.commit(token).await?;

        Ok(())
    }

    pub async fn handle_message(&self, payload: &[u8]) -> ValidationResult<()> {
        let event: NewInvoice = serde_json::from_slice(payload)?;

        debug!(invoice_id = %event.id, "reading invoice");
        let (invoice, status) = self.storage.get_invoice(event.id).await?;

        if status != InvoiceStatus::Pending {
            // Already processed: a redelivery after a crash or a duplicate
            // dispatch. Skip, and let the caller commit the offset.
            info!(invoice_id = %event.id, "duplicated validation skipped");
            return Ok(());
        }

        debug!(invoice_id = %event.id, "validating invoice");
        if self.validator.validate(&invoice).await {
            self.storage.set_approved(event.id).await?;
            info!(invoice_id = %event.id, "invoice approved");
        } else {
            self.storage.set_rejected(event.id).await?;
            info!(invoice_id = %event.id, "invoice rejected");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invoice, Item};
    use async_trait::async_trait;
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::time::Duration;
    use uuid::Uuid;

    mock! {
        Consumer {}

        #[async_trait]
        impl MessageConsumer for Consumer {
            async fn poll(&self) -> ValidationResult<Option<Vec<u8>>>;
            async fn commit(&self, token: &CancellationToken) -> ValidationResult<()>;
        }
    }

    mock! {
        Storage {}

        #[async_trait]
        impl InvoiceStorage for Storage {
            async fn get_invoice(&self, id: Uuid) -> ValidationResult<(Invoice, InvoiceStatus)>;
            async fn set_approved(&self, id: Uuid) -> ValidationResult<()>;
            async fn set_rejected(&self, id: Uuid) -> ValidationResult<()>;
        }
    }

    mock! {
        Validator {}

        #[async_trait]
        impl InvoiceValidator for Validator {
            async fn validate(&self, invoice: &Invoice) -> bool;
        }
    }

    fn invoice(id: Uuid) -> Invoice {
        Invoice {
            id,
            customer_id: Uuid::new_v4(),
            amount: 12_500,
            currency: "USD".into(),
            due_date: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![Item {
                description: "consulting".into(),
                quantity: 2,
                unit_price: 6_250,
                total: 12_500,
            }],
            notes: String::new(),
        }
    }

    fn payload(id: Uuid) -> Vec<u8> {
        serde_json::to_vec(&NewInvoice { id }).unwrap()
    }

    #[tokio::test]
    async fn pending_invoice_gets_approved() {
        let id = Uuid::new_v4();

        let mut storage = MockStorage::new();
        storage
            .expect_get_invoice()
            .with(eq(id))
            .returning(move |id| Ok((invoice(id), InvoiceStatus::Pending)));
        storage
            .expect_set_approved()
            .with(eq(id))
            .times(1)
            .returning(|_| Ok(()));
        storage.expect_set_rejected().times(0);

        let mut validator = MockValidator::new();
        validator.expect_validate().returning(|_| true);

        let run = ValidationLoop::new(MockConsumer::new(), storage, validator);
        run.handle_message(&payload(id)).await.unwrap();
    }

    #[tokio::test]
    async fn pending_invoice_gets_rejected() {
        let id = Uuid::new_v4();

        let mut storage = MockStorage::new();
        storage
            .expect_get_invoice()
            .returning(move |id| Ok((invoice(id), InvoiceStatus::Pending)));
        storage.expect_set_approved().times(0);
        storage
            .expect_set_rejected()
            .with(eq(id))
            .times(1)
            .returning(|_| Ok(()));

        let mut validator = MockValidator::new();
        validator.expect_validate().returning(|_| false);

        let run = ValidationLoop::new(MockConsumer::new(), storage, validator);
        run.handle_message(&payload(id)).await.unwrap();
    }

    #[tokio::test]
    async fn non_pending_invoice_is_skipped() {
        let id = Uuid::new_v4();

        // The redelivered message finds a terminal status and writes
        // nothing: at most one state transition per invoice.
        let mut storage = MockStorage::new();
        storage
            .expect_get_invoice()
            .returning(move |id| Ok((invoice(id), InvoiceStatus::Approved)));
        storage.expect_set_approved().times(0);
        storage.expect_set_rejected().times(0);

        let mut validator = MockValidator::new();
        validator.expect_validate().times(0);

        let run = ValidationLoop::new(MockConsumer::new(), storage, validator);
        run.handle_message(&payload(id)).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let run = ValidationLoop::new(MockConsumer::new(), MockStorage::new(), MockValidator::new());
        let err = run.handle_message(b"not json").await.unwrap_err();
        assert!(matches!(err, ValidationError::Decode(_)));
    }

    #[tokio::test]
    async fn offset_commit_follows_the_status_write() {
        let id = Uuid::new_v4();

        let mut consumer = MockConsumer::new();
        consumer
            .expect_poll()
            .times(1)
            .returning(move || Ok(Some(payload(id))));
        consumer.expect_commit().times(1).returning(|_| Ok(()));

        let mut storage = MockStorage::new();
        storage
            .expect_get_invoice()
            .returning(move |id| Ok((invoice(id), InvoiceStatus::Pending)));
        storage.expect_set_approved().times(1).returning(|_| Ok(()));

        let mut validator = MockValidator::new();
        validator.expect_validate().returning(|_| true);

        let run = ValidationLoop::new(consumer, storage, validator);
        run.tick(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn failed_handling_skips_the_commit() {
        let id = Uuid::new_v4();

        let mut consumer = MockConsumer::new();
        consumer
            .expect_poll()
            .times(1)
            .returning(move || Ok(Some(payload(id))));
        // No commit: the message must redeliver.
        consumer.expect_commit().times(0);

        let mut storage = MockStorage::new();
        storage
            .expect_get_invoice()
            .returning(|_| Err(ValidationError::Storage(tonic::Status::internal("down"))));

        let run = ValidationLoop::new(consumer, storage, MockValidator::new());
        let err = run.tick(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ValidationError::Storage(_)));
    }

    #[tokio::test]
    async fn no_message_is_not_an_error() {
        let mut consumer = MockConsumer::new();
        consumer.expect_poll().times(1).returning(|| Ok(None));
        consumer.expect_commit().times(0);

        let run = ValidationLoop::new(consumer, MockStorage::new(), MockValidator::new());
        run.tick(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let mut consumer = MockConsumer::new();
        consumer.expect_poll().returning(|| Ok(None));

        let run = ValidationLoop::new(consumer, MockStorage::new(), MockValidator::new());
        let token = CancellationToken::new();
        let mut errors = run.run(token.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while errors.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok(), "loop should exit promptly on cancellation");
    }
}
