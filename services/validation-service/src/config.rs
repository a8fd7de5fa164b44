use std::time::Duration;

use clap::Parser;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'{var}' env variable parsing failed: {source}")]
    EnvParse {
        var: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("kafka poll timeout must be greater than zero")]
    InvalidPollTimeout,
}

/// Validator configuration. Environment variables override command-line
/// flags, which override compiled defaults.
#[derive(Parser, Debug, Clone)]
#[command(name = "validation-service", about = "Invoice validation consumer")]
pub struct Config {
    /// Kafka bootstrap server address
    #[arg(long, default_value = "localhost:9092")]
    pub kafka_address: String,

    /// Storage gRPC server address
    #[arg(long, default_value = "http://localhost:9090")]
    pub storage_address: String,

    /// Kafka poll timeout, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub kafka_poll_timeout_ms: u64,

    /// Prometheus exporter port
    #[arg(long, default_value_t = 9104)]
    pub metrics_port: u16,

    /// Hard-exit deadline after a termination signal, in seconds
    #[arg(long, default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::parse();
        cfg.apply_env_overrides(|var| std::env::var(var).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = get("KAFKA_ADDRESS") {
            self.kafka_address = val;
        }
        if let Some(val) = get("STORAGE_ADDRESS") {
            self.storage_address = val;
        }
        if let Some(val) = get("KAFKA_POLL_TIMEOUT_MS") {
            self.kafka_poll_timeout_ms =
                val.parse().map_err(|source| ConfigError::EnvParse {
                    var: "KAFKA_POLL_TIMEOUT_MS",
                    source,
                })?;
        }
        if let Some(val) = get("METRICS_PORT") {
            self.metrics_port = val.parse().map_err(|source| ConfigError::EnvParse {
                var: "METRICS_PORT",
                source,
            })?;
        }
        if let Some(val) = get("SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown_timeout_secs =
                val.parse().map_err(|source| ConfigError::EnvParse {
                    var: "SHUTDOWN_TIMEOUT_SECS",
                    source,
                })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka_poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidPollTimeout);
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.kafka_poll_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Backoff between offset-commit attempts. The schedule is infinite: an
/// uncommitted offset is more dangerous than a stuck worker.
pub fn commit_retry_delays() -> Vec<Duration> {
    vec![
        Duration::from_secs(1),
        Duration::from_secs(3),
        Duration::from_secs(5),
    ]
}
