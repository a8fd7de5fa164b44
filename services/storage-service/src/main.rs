use std::sync::Arc;

use anyhow::Context;
use invoice_proto::invoice_storage_server::InvoiceStorageServer as InvoiceStorageGrpc;
use invoice_proto::outbox_storage_server::OutboxStorageServer as OutboxStorageGrpc;
use invoice_proto::validation_server::ValidationServer as ValidationGrpc;
use resilience::RetrySchedule;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storage_service::config::{db_retry_delays, Config};
use storage_service::db::TxManager;
use storage_service::grpc::{InvoiceServer, OutboxServer, ValidationServer};
use storage_service::metrics::{serve_metrics, StorageMetrics};
use storage_service::repositories::{InvoiceRepo, OutboxRepo};
use storage_service::services::{InvoiceService, OutboxService, ValidationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        grpc_address = %cfg.grpc_address,
        metrics_port = cfg.metrics_port,
        "starting storage service"
    );

    let pool = db_pool::create_pool(db_pool::DbConfig::new(cfg.database_url.clone()))
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());
    spawn_shutdown_watchdog(token.clone(), cfg.shutdown_timeout());

    let metrics = StorageMetrics::new();
    {
        let token = token.clone();
        let port = cfg.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(port, token).await {
                error!(error = %e, "metrics exporter failed");
            }
        });
    }

    let tm = TxManager::new(pool.clone());
    let invoices = InvoiceRepo::new();
    let outbox = OutboxRepo::new(pool.clone());
    let retry = RetrySchedule::bounded(db_retry_delays());

    let invoice_service = Arc::new(InvoiceService::new(
        tm.clone(),
        invoices,
        outbox.clone(),
        token.clone(),
        retry.clone(),
    ));
    let validation_service = Arc::new(ValidationService::new(
        tm.clone(),
        invoices,
        outbox.clone(),
        token.clone(),
        retry.clone(),
    ));
    let outbox_service = Arc::new(OutboxService::new(tm, outbox, token.clone(), retry));

    let addr = cfg
        .grpc_address
        .parse()
        .context("invalid gRPC listen address")?;

    info!(address = %cfg.grpc_address, "serving gRPC");

    let shutdown = token.clone();
    Server::builder()
        .add_service(InvoiceStorageGrpc::new(InvoiceServer::new(
            invoice_service,
            validation_service.clone(),
            metrics.clone(),
        )))
        .add_service(OutboxStorageGrpc::new(OutboxServer::new(
            outbox_service,
            metrics.clone(),
        )))
        .add_service(ValidationGrpc::new(ValidationServer::new(
            validation_service,
            metrics,
        )))
        .serve_with_shutdown(addr, shutdown.cancelled())
        .await
        .context("gRPC server failed")?;

    pool.close().await;
    info!("storage service shut down gracefully");

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

/// Fail the process hard if graceful shutdown hangs past the deadline.
fn spawn_shutdown_watchdog(token: CancellationToken, timeout: std::time::Duration) {
    tokio::spawn(async move {
        token.cancelled().await;
        tokio::time::sleep(timeout).await;
        error!("shutdown deadline exceeded, aborting");
        std::process::exit(1);
    });
}
