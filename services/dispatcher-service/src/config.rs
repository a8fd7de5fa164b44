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
    #[error("worker count must be greater than zero")]
    InvalidWorkerCount,
    #[error("retry interval must be greater than zero")]
    InvalidRetryInterval,
    #[error("dispatch interval must be greater than zero")]
    InvalidDispatchInterval,
}

/// Dispatcher configuration. Environment variables override command-line
/// flags, which override compiled defaults.
#[derive(Parser, Debug, Clone)]
#[command(name = "dispatcher-service", about = "Outbox dispatcher")]
pub struct Config {
    /// Kafka bootstrap server address
    #[arg(long, default_value = "localhost:9092")]
    pub kafka_address: String,

    /// Storage gRPC server address
    #[arg(long, default_value = "http://localhost:9090")]
    pub storage_address: String,

    /// Number of parallel publisher workers
    #[arg(long, default_value_t = 3)]
    pub num_workers: usize,

    /// Lease extension for claimed rows, in seconds
    #[arg(long, default_value_t = 30)]
    pub retry_interval_secs: u64,

    /// Minimum delay between outbox polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub dispatch_interval_ms: u64,

    /// Prometheus exporter port
    #[arg(long, default_value_t = 9103)]
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
        if let Some(val) = get("NUM_WORKERS") {
            self.num_workers = parse_env("NUM_WORKERS", &val)?;
        }
        if let Some(val) = get("RETRY_INTERVAL_SECS") {
            self.retry_interval_secs = parse_env("RETRY_INTERVAL_SECS", &val)?;
        }
        if let Some(val) = get("DISPATCH_INTERVAL_MS") {
            self.dispatch_interval_ms = parse_env("DISPATCH_INTERVAL_MS", &val)?;
        }
        if let Some(val) = get("METRICS_PORT") {
            self.metrics_port = parse_env("METRICS_PORT", &val)?;
        }
        if let Some(val) = get("SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown_timeout_secs = parse_env("SHUTDOWN_TIMEOUT_SECS", &val)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if self.retry_interval_secs == 0 {
            return Err(ConfigError::InvalidRetryInterval);
        }
        if self.dispatch_interval_ms == 0 {
            return Err(ConfigError::InvalidDispatchInterval);
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_env<T>(var: &'static str, val: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    val.parse().map_err(|source| ConfigError::EnvParse { var, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn zero_workers_is_rejected() {
        let cfg = Config::try_parse_from(["dispatcher-service", "--num-workers", "0"]).unwrap();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn env_overrides_flags() {
        let mut cfg =
            Config::try_parse_from(["dispatcher-service", "--num-workers", "2"]).unwrap();
        let env: HashMap<&str, &str> = [("NUM_WORKERS", "8")].into_iter().collect();
        cfg.apply_env_overrides(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.num_workers, 8);
    }
}
