use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Clone)]
pub struct StorageMetrics {
    pub invoices_uploaded: IntCounter,
    pub outbox_claimed: IntCounter,
    pub outbox_deleted: IntCounter,
    pub statuses_set: IntCounterVec,
}

impl StorageMetrics {
    pub fn new() -> Self {
        let registry = prometheus::default_registry();

        let invoices_uploaded = IntCounter::with_opts(Opts::new(
            "storage_invoices_uploaded_total",
            "Invoices persisted together with their outbox message",
        ))
        .expect("valid metric opts for storage_invoices_uploaded_total");

        let outbox_claimed = IntCounter::with_opts(Opts::new(
            "storage_outbox_claimed_total",
            "Outbox rows handed to dispatchers with an extended lease",
        ))
        .expect("valid metric opts for storage_outbox_claimed_total");

        let outbox_deleted = IntCounter::with_opts(Opts::new(
            "storage_outbox_deleted_total",
            "Outbox rows deleted after broker acknowledgement",
        ))
        .expect("valid metric opts for storage_outbox_deleted_total");

        let statuses_set = IntCounterVec::new(
            Opts::new(
                "storage_statuses_set_total",
                "Validation decisions recorded, by outcome",
            ),
            &["status"],
        )
        .expect("valid metric opts for storage_statuses_set_total");

        for metric in [
            Box::new(invoices_uploaded.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(outbox_claimed.clone()),
            Box::new(outbox_deleted.clone()),
            Box::new(statuses_set.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register storage metric: {}", e);
            }
        }

        Self {
            invoices_uploaded,
            outbox_claimed,
            outbox_deleted,
            statuses_set,
        }
    }
}

impl Default for StorageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

async fn metrics_handler() -> HttpResponse {
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
        return HttpResponse::InternalServerError().body(e.to_string());
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

/// Serve the Prometheus text endpoint until the token fires.
pub async fn serve_metrics(port: u16, token: CancellationToken) -> std::io::Result<()> {
    let server = HttpServer::new(|| App::new().route("/metrics", web::get().to(metrics_handler)))
        .bind(("0.0.0.0", port))?
        .disable_signals()
        .run();

    let handle = server.handle();
    tokio::spawn(async move {
        token.cancelled().await;
        handle.stop(true).await;
    });

    server.await
}
