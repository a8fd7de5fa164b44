use prometheus::{IntCounter, IntGauge, Opts};
use tracing::warn;

/// Prometheus instrumentation for the dispatcher pipeline.
#[derive(Clone)]
pub struct OutboxMetrics {
    pub published: IntCounter,
    pub publish_errors: IntCounter,
    pub delete_errors: IntCounter,
    pub inflight: IntGauge,
}

impl OutboxMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let published = IntCounter::with_opts(
            Opts::new(
                "outbox_published_total",
                "Outbox messages acknowledged by the broker and deleted",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_published_total");

        let publish_errors = IntCounter::with_opts(
            Opts::new(
                "outbox_publish_errors_total",
                "Failed broker publish attempts (message stays leased for retry)",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_publish_errors_total");

        let delete_errors = IntCounter::with_opts(
            Opts::new(
                "outbox_delete_errors_total",
                "Failed outbox deletes after a successful publish",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_delete_errors_total");

        let inflight = IntGauge::with_opts(
            Opts::new(
                "outbox_inflight",
                "Messages currently being published by workers",
            )
            .const_label("service", service.to_string()),
        )
        .expect("valid metric opts for outbox_inflight");

        for metric in [
            Box::new(published.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(publish_errors.clone()),
            Box::new(delete_errors.clone()),
            Box::new(inflight.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register outbox metric: {}", e);
            }
        }

        Self {
            published,
            publish_errors,
            delete_errors,
            inflight,
        }
    }
}
