//! OpenTelemetry metrics.
//!
//! Key metrics:
//! - spillway_messages_sent_total: Counter for unsolicited messages published
//! - spillway_messages_received_total: Counter for messages taken by the responder
//! - spillway_probes_total: Counter for backlog probes issued
//! - spillway_probe_timeouts_total: Counter for probes abandoned after the timeout
//! - spillway_window_size: Gauge for the current flow window

use opentelemetry::metrics::{Counter, Gauge, Meter, MetricsError};
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
use std::sync::OnceLock;

/// Global metrics instance.
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Spillway metrics registry.
#[derive(Debug)]
pub struct Metrics {
    pub messages_sent: Counter<u64>,
    pub messages_received: Counter<u64>,
    pub probes: Counter<u64>,
    pub probe_timeouts: Counter<u64>,
    pub window_size: Gauge<u64>,
}

impl Metrics {
    /// Create a new metrics registry from a meter.
    fn new(meter: &Meter) -> Self {
        Self {
            messages_sent: meter
                .u64_counter("spillway_messages_sent_total")
                .with_description("Unsolicited messages published")
                .with_unit("1")
                .init(),
            messages_received: meter
                .u64_counter("spillway_messages_received_total")
                .with_description("Messages taken by the responder loop")
                .with_unit("1")
                .init(),
            probes: meter
                .u64_counter("spillway_probes_total")
                .with_description("Backlog probes issued")
                .with_unit("1")
                .init(),
            probe_timeouts: meter
                .u64_counter("spillway_probe_timeouts_total")
                .with_description("Probes abandoned after the reply timeout")
                .with_unit("1")
                .init(),
            window_size: meter
                .u64_gauge("spillway_window_size")
                .with_description("Current flow window in messages")
                .with_unit("1")
                .init(),
        }
    }
}

/// Initialize the metrics system.
///
/// This should be called once at startup. Subsequent calls are ignored.
///
/// # Arguments
///
/// * `otel_endpoint` - Optional OTLP endpoint for metrics export
pub fn init_metrics_with_endpoint(otel_endpoint: Option<&str>) {
    METRICS.get_or_init(|| {
        match otel_endpoint.map(otlp_provider) {
            Some(Ok(provider)) => global::set_meter_provider(provider),
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    "Failed to create OTLP exporter, metrics are not exported"
                );
                set_manual_provider();
            }
            None => set_manual_provider(),
        }

        let meter = global::meter("spillway");
        Metrics::new(&meter)
    });
}

/// Periodic OTLP/gRPC export to `endpoint`.
fn otlp_provider(endpoint: &str) -> Result<SdkMeterProvider, MetricsError> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);
    let provider = opentelemetry_otlp::new_pipeline()
        .metrics(opentelemetry_sdk::runtime::Tokio)
        .with_exporter(exporter)
        .build()?;

    tracing::info!(endpoint, "OTLP metrics exporter configured");
    Ok(provider)
}

/// Metrics are recorded but not exported.
fn set_manual_provider() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    global::set_meter_provider(provider);
}

/// Initialize the metrics system without OTLP export.
pub fn init_metrics() {
    init_metrics_with_endpoint(None);
}

/// Record a published unsolicited message.
pub fn record_sent(subject: &str) {
    if let Some(m) = METRICS.get() {
        m.messages_sent
            .add(1, &[KeyValue::new("subject", subject.to_string())]);
    }
}

/// Record a message taken by the responder.
pub fn record_received(subject: &str) {
    if let Some(m) = METRICS.get() {
        m.messages_received
            .add(1, &[KeyValue::new("subject", subject.to_string())]);
    }
}

/// Record an issued probe.
pub fn record_probe(subject: &str) {
    if let Some(m) = METRICS.get() {
        m.probes.add(1, &[KeyValue::new("subject", subject.to_string())]);
    }
}

/// Record a probe timeout.
pub fn record_probe_timeout(subject: &str) {
    if let Some(m) = METRICS.get() {
        m.probe_timeouts
            .add(1, &[KeyValue::new("subject", subject.to_string())]);
    }
}

/// Record the window size after a change.
pub fn record_window(window: u64) {
    if let Some(m) = METRICS.get() {
        m.window_size.record(window, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        init_metrics();
        init_metrics();
        assert!(METRICS.get().is_some());
    }

    #[test]
    fn test_bad_endpoint_is_rejected() {
        assert!(otlp_provider("not a valid endpoint").is_err());
    }

    #[test]
    fn test_record_before_and_after_init() {
        // Recording never panics, initialized or not
        record_sent("bench");
        init_metrics();
        record_sent("bench");
        record_received("bench");
        record_probe("bench");
        record_probe_timeout("bench");
        record_window(1024);
    }
}
