use std::sync::Arc;

use actix_web::middleware::{Compress, Condition};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_service::config::Config;
use api_service::handlers::{self, InvoiceStorageGate};
use api_service::metrics::serve_metrics;
use api_service::middleware::{JwtAuthMiddleware, MetricsMiddleware};
use api_service::services::StorageClient;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        http_address = %cfg.http_address,
        storage_address = %cfg.storage_address,
        jwt_enabled = cfg.jwt_enabled,
        "starting api service"
    );

    let storage: Arc<dyn InvoiceStorageGate> =
        Arc::new(StorageClient::connect(cfg.storage_address.clone())?);

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());
    spawn_shutdown_watchdog(token.clone(), cfg.shutdown_timeout());

    {
        let token = token.clone();
        let port = cfg.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(port, token).await {
                error!(error = %e, "metrics exporter failed");
            }
        });
    }

    let jwt_enabled = cfg.jwt_enabled;
    let jwt_secret = cfg.jwt_secret.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(storage.clone()))
            // Outer to inner: metrics, request span, auth (disabled by
            // default), response compression. Request decompression is
            // handled by the payload codecs.
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .wrap(Condition::new(
                jwt_enabled,
                JwtAuthMiddleware::new(jwt_secret.clone()),
            ))
            .wrap(Compress::default())
            .configure(handlers::register_routes)
    })
    .bind(&cfg.http_address)
    .context("failed to bind HTTP listener")?
    .disable_signals()
    .run();

    let handle = server.handle();
    {
        let token = token.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            handle.stop(true).await;
        });
    }

    server.await.context("HTTP server failed")?;
    info!("api service shut down gracefully");

    Ok(())
}

fn spawn_signal_listener(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = tokio::signal::ctrl_c() => {},
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        info!("termination signal received, shutting down");
        token.cancel();
    });
}

fn spawn_shutdown_watchdog(token: CancellationToken, timeout: std::time::Duration) {
    tokio::spawn(async move {
        token.cancelled().await;
        tokio::time::sleep(timeout).await;
        error!("shutdown deadline exceeded, aborting");
        std::process::exit(1);
    });
}
