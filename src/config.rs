//! Configuration for VIRTA

use crate::error::{Result, VirtaError};
use std::env;
use std::net::SocketAddr;

/// Main configuration for the VIRTA binary
#[derive(Debug, Clone)]
pub struct Config {
    /// Metrics server address
    pub metrics_addr: SocketAddr,

    /// Pending-trigger queue capacity
    pub queue_capacity: usize,

    /// URL template for the HTTP fetcher; `{key}` is replaced per request
    pub url_template: String,

    /// HTTP request timeout in seconds
    pub http_timeout_secs: u64,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            queue_capacity: 1024,
            url_template: "https://random-data-api.com/api/{key}/random_{key}".to_string(),
            http_timeout_secs: 30,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(addr) = env::var("VIRTA_METRICS_ADDR") {
            config.metrics_addr = addr
                .parse()
                .map_err(|e| VirtaError::Config(format!("invalid VIRTA_METRICS_ADDR: {e}")))?;
        }

        if let Ok(cap) = env::var("VIRTA_QUEUE_CAPACITY") {
            config.queue_capacity = cap
                .parse()
                .map_err(|e| VirtaError::Config(format!("invalid VIRTA_QUEUE_CAPACITY: {e}")))?;
        }

        if let Ok(template) = env::var("VIRTA_URL_TEMPLATE") {
            config.url_template = template;
        }

        if let Ok(timeout) = env::var("VIRTA_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout
                .parse()
                .map_err(|e| VirtaError::Config(format!("invalid VIRTA_HTTP_TIMEOUT_SECS: {e}")))?;
        }

        if let Ok(level) = env::var("VIRTA_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Ok(format) = env::var("VIRTA_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(VirtaError::Config(format!(
                        "invalid VIRTA_LOG_FORMAT: {other} (expected 'json' or 'pretty')"
                    )))
                }
            };
        }

        Ok(config)
    }
}
