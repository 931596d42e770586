//! Prometheus metrics for VIRTA

use crate::error::{Result, VirtaError};
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All VIRTA metrics
pub struct Metrics {
    /// Triggers received (by source)
    pub triggers_received: CounterVec,

    /// Outcomes delivered (by kind: success, failure, masked)
    pub outcomes: CounterVec,

    /// Sink delivery errors (by sink)
    pub sink_errors: CounterVec,

    /// Request latency from issue to settlement (by fetcher)
    pub fetch_latency: HistogramVec,

    /// Pipeline lifecycle (1 = active, 0 = terminated)
    pub pipeline_active: Gauge,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            triggers_received: register_counter_vec!(
                "virta_triggers_received_total",
                "Total triggers received",
                &["source"]
            )
            .map_err(|e| VirtaError::Metrics(format!("triggers_received: {e}")))?,

            outcomes: register_counter_vec!(
                "virta_outcomes_total",
                "Total outcomes delivered, by kind",
                &["kind"]
            )
            .map_err(|e| VirtaError::Metrics(format!("outcomes: {e}")))?,

            sink_errors: register_counter_vec!(
                "virta_sink_errors_total",
                "Total sink delivery errors",
                &["sink"]
            )
            .map_err(|e| VirtaError::Metrics(format!("sink_errors: {e}")))?,

            fetch_latency: register_histogram_vec!(
                "virta_fetch_latency_seconds",
                "Request latency from issue to settlement",
                &["fetcher"],
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            )
            .map_err(|e| VirtaError::Metrics(format!("fetch_latency: {e}")))?,

            pipeline_active: register_gauge!(
                "virta_pipeline_active",
                "Pipeline lifecycle (1 = active, 0 = terminated)"
            )
            .map_err(|e| VirtaError::Metrics(format!("pipeline_active: {e}")))?,
        };

        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| VirtaError::Metrics("failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record a trigger received
    pub fn record_trigger(&self, source: &str) {
        self.triggers_received.with_label_values(&[source]).inc();
    }

    /// Record an outcome by kind
    pub fn record_outcome(&self, kind: &str) {
        self.outcomes.with_label_values(&[kind]).inc();
    }

    /// Record a sink delivery error
    pub fn record_sink_error(&self, sink: &str) {
        self.sink_errors.with_label_values(&[sink]).inc();
    }

    /// Record request latency
    pub fn record_latency(&self, fetcher: &str, seconds: f64) {
        self.fetch_latency
            .with_label_values(&[fetcher])
            .observe(seconds);
    }

    /// Set pipeline lifecycle gauge
    pub fn set_active(&self, active: bool) {
        self.pipeline_active.set(if active { 1.0 } else { 0.0 });
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Helper to record a trigger if metrics are initialized, otherwise skip
pub fn try_record_trigger(source: &str) {
    if let Some(m) = Metrics::get() {
        m.record_trigger(source);
    }
}

/// Helper to record an outcome if metrics are initialized, otherwise skip
pub fn try_record_outcome(kind: &str) {
    if let Some(m) = Metrics::get() {
        m.record_outcome(kind);
    }
}

/// Helper to record a sink error if metrics are initialized, otherwise skip
pub fn try_record_sink_error(sink: &str) {
    if let Some(m) = Metrics::get() {
        m.record_sink_error(sink);
    }
}

/// Helper to record latency if metrics are initialized, otherwise skip
pub fn try_record_latency(fetcher: &str, seconds: f64) {
    if let Some(m) = Metrics::get() {
        m.record_latency(fetcher, seconds);
    }
}

/// Helper to set the lifecycle gauge if metrics are initialized, otherwise skip
pub fn try_set_active(active: bool) {
    if let Some(m) = Metrics::get() {
        m.set_active(active);
    }
}
