use std::sync::Arc;

use invoice_proto::validation_server::Validation;
use invoice_proto::{
    GetInvoiceRequest, GetInvoiceResponse, SetApprovedRequest, SetApprovedResponse,
    SetRejectedRequest, SetRejectedResponse,
};
use tonic::{Request, Response, Status};

use crate::metrics::StorageMetrics;
use crate::services::ValidationService;

use super::{invoice_to_proto, parse_uuid, status_to_proto};

/// Serves the validation consumer: snapshot reads and decision writes.
pub struct ValidationServer {
    validation: Arc<ValidationService>,
    metrics: StorageMetrics,
}

impl ValidationServer {
    pub fn new(validation: Arc<ValidationService>, metrics: StorageMetrics) -> Self {
        Self {
            validation,
            metrics,
        }
    }
}

#[tonic::async_trait]
impl Validation for ValidationServer {
    async fn get_invoice(
        &self,
        request: Request<GetInvoiceRequest>,
    ) -> Result<Response<GetInvoiceResponse>, Status> {
        let id = parse_uuid(request.into_inner().id.as_ref())?;

        let (invoice, status) = self.validation.get(id).await.map_err(Status::from)?;

        Ok(Response::new(GetInvoiceResponse {
            invoice: Some(invoice_to_proto(invoice)),
            status: status_to_proto(status) as i32,
        }))
    }

    async fn set_approved(
        &self,
        request: Request<SetApprovedRequest>,
    ) -> Result<Response<SetApprovedResponse>, Status> {
        let id = parse_uuid(request.into_inner().id.as_ref())?;

        self.validation
            .set_approved(id)
            .await
            .map_err(Status::from)?;
        self.metrics
            .statuses_set
            .with_label_values(&["approved"])
            .inc();

        Ok(Response::new(SetApprovedResponse {}))
    }

    async fn set_rejected(
        &self,
        request: Request<SetRejectedRequest>,
    ) -> Result<Response<SetRejectedResponse>, Status> {
        let id = parse_uuid(request.into_inner().id.as_ref())?;

        self.validation
            .set_rejected(id)
            .await
            .map_err(Status::from)?;
        self.metrics
            .statuses_set
            .with_label_values(&["rejected"])
            .inc();

        Ok(Response::new(SetRejectedResponse {}))
    }
}
