use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, TextEncoder};
use tokio_util::sync::CancellationToken;

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
