//! OpenTelemetry observability infrastructure.
//!
//! Provides:
//! - Structured logging via tracing
//! - OTLP metrics for window changes, probes and message counts

pub mod metrics;
pub mod tracing;
