use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::{
    DispatcherConfig, KafkaPublisher, OutboxDispatcher, OutboxMetrics,
};

mod config;
mod metrics;
mod services;

use config::Config;
use services::StorageClient;

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
        num_workers = cfg.num_workers,
        "starting dispatcher service"
    );

    event_schema::ensure_topics(&cfg.kafka_address, &event_schema::TOPICS)
        .await
        .context("failed to ensure topics")?;

    let token = CancellationToken::new();
    spawn_signal_listener(token.clone());
    spawn_shutdown_watchdog(token.clone(), cfg.shutdown_timeout());

    {
        let token = token.clone();
        let port = cfg.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(port, token).await {
                error!(error = %e, "metrics exporter failed");
            }
        });
    }

    let store = Arc::new(
        StorageClient::connect(cfg.storage_address.clone())
            .context("failed to create storage client")?,
    );
    let publisher = Arc::new(
        KafkaPublisher::connect(&cfg.kafka_address).context("failed to create kafka producer")?,
    );

    let dispatcher = OutboxDispatcher::new(
        DispatcherConfig {
            num_workers: cfg.num_workers,
            retry_interval: cfg.retry_interval(),
            dispatch_interval: cfg.dispatch_interval(),
        },
        store,
        publisher,
    )
    .with_metrics(OutboxMetrics::new("dispatcher-service"));

    // Drain the merged error stream; the pipeline survives individual
    // failures, so these are log-and-continue.
    let mut errors = dispatcher.run(token.clone());
    while let Some(err) = errors.recv().await {
        error!(error = %err, "outbox dispatch error");
    }

    info!("dispatcher service shut down gracefully");

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
