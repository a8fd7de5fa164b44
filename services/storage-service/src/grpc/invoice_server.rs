use std::sync::Arc;

use invoice_proto::invoice_storage_server::InvoiceStorage;
use invoice_proto::{GetRequest, GetResponse, UploadRequest, UploadResponse};
use tonic::{Request, Response, Status};
use tracing::info;

use crate::metrics::StorageMetrics;
use crate::services::{InvoiceService, ValidationService};

use super::{invoice_from_proto, invoice_to_proto, parse_uuid, status_to_proto};

/// Serves the writer gate: transactional upload and the read path.
pub struct InvoiceServer {
    invoices: Arc<InvoiceService>,
    validation: Arc<ValidationService>,
    metrics: StorageMetrics,
}

impl InvoiceServer {
    pub fn new(
        invoices: Arc<InvoiceService>,
        validation: Arc<ValidationService>,
        metrics: StorageMetrics,
    ) -> Self {
        Self {
            invoices,
            validation,
            metrics,
        }
    }
}

#[tonic::async_trait]
impl InvoiceStorage for InvoiceServer {
    async fn upload(
        &self,
        request: Request<UploadRequest>,
    ) -> Result<Response<UploadResponse>, Status> {
        let invoice = request
            .into_inner()
            .invoice
            .ok_or_else(|| Status::invalid_argument("missing invoice"))?;
        let invoice = invoice_from_proto(invoice)?;

        info!(invoice_id = %invoice.id, "upload request");
        self.invoices.add_new(&invoice).await.map_err(Status::from)?;
        self.metrics.invoices_uploaded.inc();

        Ok(Response::new(UploadResponse {}))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let id = parse_uuid(request.into_inner().id.as_ref())?;

        let (invoice, status) = self.validation.get(id).await.map_err(Status::from)?;

        Ok(Response::new(GetResponse {
            invoice: Some(invoice_to_proto(invoice)),
            status: status_to_proto(status) as i32,
        }))
    }
}
