//! VIRTA - Resilient trigger-to-request pipeline demo
//!
//! Reads endpoint keys from stdin, one per line. Each line is a trigger: the
//! key is fetched from the configured URL template and the outcome printed.
//! A bad key produces a failure outcome - and the next line still works.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings, then type endpoint keys
//! cargo run
//! food
//! something-bogus
//! food
//! ```
//!
//! ## Environment Variables
//!
//! - `VIRTA_METRICS_ADDR`: Metrics server address (default: "0.0.0.0:9090")
//! - `VIRTA_QUEUE_CAPACITY`: Pending-trigger queue capacity (default: 1024)
//! - `VIRTA_URL_TEMPLATE`: URL template with `{key}` placeholders
//! - `VIRTA_HTTP_TIMEOUT_SECS`: HTTP request timeout (default: 30)
//! - `VIRTA_LOG_LEVEL`: Log level (default: "info")
//! - `VIRTA_LOG_FORMAT`: Log format, "json" or "pretty" (default: "pretty")

use bytes::Bytes;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use virta::config::{Config, LogFormat};
use virta::fetch::HttpFetcher;
use virta::metrics::Metrics;
use virta::metrics_server::MetricsServer;
use virta::pipeline::Pipeline;
use virta::sink::StdoutSink;
use virta::trigger::Trigger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    info!(
        metrics_addr = %config.metrics_addr,
        queue_capacity = config.queue_capacity,
        url_template = %config.url_template,
        "Starting VIRTA"
    );

    // Initialize metrics and serve them
    Metrics::init()?;
    let metrics_handle = MetricsServer::start(config.metrics_addr);

    // Wire the pipeline: stdin lines -> HTTP fetch -> stdout outcomes
    let fetcher = HttpFetcher::with_timeout(
        config.url_template.as_str(),
        Duration::from_secs(config.http_timeout_secs),
    )?;
    let (sender, subscription) = Pipeline::new()
        .queue_capacity(config.queue_capacity)
        .fetcher(fetcher)
        .sink(StdoutSink::pretty())
        .start()?;

    info!("Type an endpoint key and press enter to fetch; Ctrl+C to exit");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = sender.send(Trigger::new("stdin", Bytes::from(line))).await {
                        error!(error = %e, "Failed to enqueue trigger");
                        break;
                    }
                }
                Ok(None) => {
                    info!("Stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read stdin");
                    break;
                }
            },
        }
    }

    // Explicit teardown: the only path that completes the pipeline
    subscription.unsubscribe().await?;
    metrics_handle.abort();

    info!("VIRTA shutdown complete");
    Ok(())
}
