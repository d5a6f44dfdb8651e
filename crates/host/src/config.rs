//! Host configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use projections::{WorkerConfig, WriterConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Runtime configuration with defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `PROJECTION_POLL_INTERVAL_MS`: worker idle poll period (default `500`)
/// - `PROJECTION_BATCH_SIZE`: events per worker read (default `256`)
/// - `SETTLEMENT_INTERVAL_SECS`: scheduler period (default `60`)
/// - `METRICS_PORT`: Prometheus exporter port (default `9000`)
/// - `IGNORE_DUPLICATE_TABLES`: comma-separated tables whose duplicate
///   inserts are no-ops (default: the settlement fee, balance change and
///   processed-events tables)
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub projection_poll_interval: Duration,
    pub projection_batch_size: usize,
    pub settlement_interval: Duration,
    pub metrics_port: u16,
    pub writer: WriterConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            projection_poll_interval: number("PROJECTION_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.projection_poll_interval),
            projection_batch_size: number("PROJECTION_BATCH_SIZE")
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.projection_batch_size),
            settlement_interval: number("SETTLEMENT_INTERVAL_SECS")
                .filter(|n| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.settlement_interval),
            metrics_port: lookup("METRICS_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.metrics_port),
            writer: lookup("IGNORE_DUPLICATE_TABLES")
                .map(|v| WriterConfig::parse(&v))
                .unwrap_or(defaults.writer),
        }
    }

    /// Listen address of the Prometheus exporter.
    pub fn metrics_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.metrics_port))
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: self.projection_poll_interval,
            batch_size: self.projection_batch_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            projection_poll_interval: Duration::from_millis(500),
            projection_batch_size: 256,
            settlement_interval: Duration::from_secs(60),
            metrics_port: 9000,
            writer: WriterConfig::default(),
        }
    }
}
