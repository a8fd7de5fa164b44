use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Clone)]
pub struct ValidationMetrics {
    pub consumed: IntCounter,
    pub handled: IntCounterVec,
    /// Failed offset-commit attempts. The commit loop is infinite, so this
    /// counter is the operator's visibility into a stuck consumer.
    pub commit_retries: IntCounter,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        let registry = prometheus::default_registry();

        let consumed = IntCounter::with_opts(Opts::new(
            "kafka_consumed_messages_total",
            "Messages received from the new_invoice topic",
        ))
        .expect("valid metric opts for kafka_consumed_messages_total");

        let handled = IntCounterVec::new(
            Opts::new(
                "invoices_handled_total",
                "Validation decisions written back, by outcome",
            ),
            &["status"],
        )
        .expect("valid metric opts for invoices_handled_total");

        let commit_retries = IntCounter::with_opts(Opts::new(
            "offset_commit_retries_total",
            "Failed offset-commit attempts before eventual success",
        ))
        .expect("valid metric opts for offset_commit_retries_total");

        for metric in [
            Box::new(consumed.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(handled.clone()),
            Box::new(commit_retries.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register validation metric: {}", e);
            }
        }

        Self {
            consumed,
            handled,
            commit_retries,
        }
    }
}

impl Default for ValidationMetrics {
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
