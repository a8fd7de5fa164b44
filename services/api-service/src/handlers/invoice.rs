use std::sync::Arc;

use actix_web::{web, HttpResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::dto::{Invoice, InvoiceJson};
use crate::error::ApiResult;

/// The slice of storage the handlers consume.
#[async_trait]
pub trait InvoiceStorageGate: Send + Sync {
    async fn upload(&self, invoice: Invoice) -> ApiResult<()>;
    async fn get(&self, id: Uuid) -> ApiResult<(Invoice, String)>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInvoiceRequest {
    pub invoice: InvoiceJson,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetInvoiceRequest {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GetInvoiceResponse {
    pub invoice: InvoiceJson,
    pub status: String,
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/user/invoice")
            .route("/create", web::post().to(create))
            .route("/get", web::get().to(get)),
    );
}

async fn create(
    storage: web::Data<Arc<dyn InvoiceStorageGate>>,
    body: web::Json<CreateInvoiceRequest>,
) -> ApiResult<HttpResponse> {
    let invoice = body.into_inner().invoice.into_domain()?;
    let id = invoice.id;

    storage.upload(invoice).await?;
    info!(invoice_id = %id, "invoice accepted");

    Ok(HttpResponse::Ok().finish())
}

async fn get(
    storage: web::Data<Arc<dyn InvoiceStorageGate>>,
    body: web::Json<GetInvoiceRequest>,
) -> ApiResult<HttpResponse> {
    let (invoice, status) = storage.get(body.id).await?;

    Ok(HttpResponse::Ok().json(GetInvoiceResponse {
        invoice: invoice.into_wire(),
        status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use actix_web::{http::StatusCode, test, App};
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    mock! {
        Gate {}

        #[async_trait]
        impl InvoiceStorageGate for Gate {
            async fn upload(&self, invoice: Invoice) -> ApiResult<()>;
            async fn get(&self, id: Uuid) -> ApiResult<(Invoice, String)>;
        }
    }

    fn wire_invoice(id: Uuid) -> InvoiceJson {
        InvoiceJson {
            id,
            customer_id: Uuid::new_v4(),
            amount: Decimal::from_str("12.500").unwrap(),
            currency: "USD".into(),
            due_date: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: vec![],
            notes: String::new(),
        }
    }

    macro_rules! app_with {
        ($gate:expr) => {{
            let gate: Arc<dyn InvoiceStorageGate> = Arc::new($gate);
            test::init_service(
                App::new()
                    .app_data(web::Data::new(gate))
                    .configure(register_routes),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn create_converts_amounts_and_returns_200() {
        let id = Uuid::new_v4();
        let mut gate = MockGate::new();
        gate.expect_upload()
            .withf(|invoice| invoice.amount == 12_500)
            .returning(|_| Ok(()));

        let app = app_with!(gate);
        let req = test::TestRequest::post()
            .uri("/api/user/invoice/create")
            .set_json(serde_json::json!({ "invoice": wire_invoice(id) }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn create_rejects_malformed_bodies_with_400() {
        let app = app_with!(MockGate::new());
        let req = test::TestRequest::post()
            .uri("/api/user/invoice/create")
            .set_json(serde_json::json!({ "invoice": { "id": "not-a-uuid" } }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn create_maps_storage_failures_to_500() {
        let mut gate = MockGate::new();
        gate.expect_upload()
            .returning(|_| Err(ApiError::Storage(tonic::Status::internal("down"))));

        let app = app_with!(gate);
        let req = test::TestRequest::post()
            .uri("/api/user/invoice/create")
            .set_json(serde_json::json!({ "invoice": wire_invoice(Uuid::new_v4()) }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn get_returns_invoice_with_status() {
        let id = Uuid::new_v4();
        let mut gate = MockGate::new();
        gate.expect_get().with(eq(id)).returning(move |id| {
            Ok((
                Invoice {
                    id,
                    customer_id: Uuid::new_v4(),
                    amount: 12_500,
                    currency: "USD".into(),
                    due_date: Utc::now(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                    items: vec![],
                    notes: String::new(),
                },
                "PENDING".to_string(),
            ))
        });

        let app = app_with!(gate);
        let req = test::TestRequest::get()
            .uri("/api/user/invoice/get")
            .set_json(serde_json::json!({ "id": id }))
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "PENDING");
        assert_eq!(body["invoice"]["amount"], serde_json::json!("12.500"));
    }
}
