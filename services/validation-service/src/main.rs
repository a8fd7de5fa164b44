use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use validation_service::config::{commit_retry_delays, Config};
use validation_service::consumer::InvoiceConsumer;
use validation_service::dispatcher::ValidationLoop;
use validation_service::metrics::{serve_metrics, ValidationMetrics};
use validation_service::storage::StorageClient;
use validation_service::validator::RandomValidator;

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
        kafka_address = %cfg.kafka_address,
        storage_address = %cfg.storage_address,
        poll_timeout_ms = cfg.kafka_poll_timeout_ms,
        "starting validation service"
    );

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());
    spawn_shutdown_watchdog(token.clone(), cfg.shutdown_timeout());

    let metrics = ValidationMetrics::new();
    {
        let token = token.clone();
        let port = cfg.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(port, token).await {
                error!(error = %e, "metrics exporter failed");
            }
        });
    }

    let consumer = InvoiceConsumer::new(
        &cfg.kafka_address,
        cfg.poll_timeout(),
        commit_retry_delays(),
        metrics.clone(),
    )
    .context("failed to create kafka consumer")?;

    let storage = StorageClient::connect(cfg.storage_address.clone(), metrics)
        .context("failed to create storage client")?;

    let validation = ValidationLoop::new(consumer, storage, RandomValidator::new());

    let mut errors = validation.run(token.clone());
    while let Some(err) = errors.recv().await {
        error!(error = %err, "validation error");
    }

    info!("validation service shut down gracefully");

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
