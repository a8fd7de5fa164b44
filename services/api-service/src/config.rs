use std::time::Duration;

use clap::Parser;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("'{var}' env variable parsing failed: {source}")]
    EnvParse {
        var: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("jwt verification enabled but no secret configured")]
    MissingJwtSecret,
}

/// API service configuration. Environment variables override command-line
/// flags, which override compiled defaults.
#[derive(Parser, Debug, Clone)]
#[command(name = "api-service", about = "Invoice HTTP gateway")]
pub struct Config {
    /// HTTP listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub http_address: String,

    /// Storage gRPC server address
    #[arg(long, default_value = "http://localhost:9090")]
    pub storage_address: String,

    /// Prometheus exporter port
    #[arg(long, default_value_t = 9101)]
    pub metrics_port: u16,

    /// Hard-exit deadline after a termination signal, in seconds
    #[arg(long, default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Verify HS256 bearer tokens on every request
    #[arg(long, default_value_t = false)]
    pub jwt_enabled: bool,

    /// Shared secret for token verification
    #[arg(long, default_value = "")]
    pub jwt_secret: String,
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
        if let Some(val) = get("HTTP_ADDRESS") {
            self.http_address = val;
        }
        if let Some(val) = get("STORAGE_ADDRESS") {
            self.storage_address = val;
        }
        if let Some(val) = get("METRICS_PORT") {
            self.metrics_port = parse_env("METRICS_PORT", &val)?;
        }
        if let Some(val) = get("SHUTDOWN_TIMEOUT_SECS") {
            self.shutdown_timeout_secs = parse_env("SHUTDOWN_TIMEOUT_SECS", &val)?;
        }
        if let Some(val) = get("JWT_ENABLED") {
            self.jwt_enabled = parse_env("JWT_ENABLED", &val)?;
        }
        if let Some(val) = get("JWT_SECRET") {
            self.jwt_secret = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_enabled && self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_env<T>(var: &'static str, val: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    val.parse().map_err(|e: T::Err| ConfigError::EnvParse {
        var,
        source: Box::new(e),
    })
}
