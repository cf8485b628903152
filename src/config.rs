//! Configuration parsing for Spillway.
//!
//! Supports:
//! - CLI arguments via clap, with environment variable fallbacks
//! - Library-level run configurations with sensible defaults
//! - Validation before any connection is attempted

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::RunError;
use crate::flow::window::{WindowConfig, DEFAULT_CAP_FACTOR, DEFAULT_WINDOW};
use crate::report::OutputFormat;

/// Default NATS server URL.
pub const DEFAULT_URL: &str = "nats://127.0.0.1:4222";

/// Connection name announced to the server.
pub const CONNECTION_NAME: &str = "Spillway Max Throughput Test";

/// Largest payload accepted for a benchmark message (64MB).
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Default wait for a probe reply before the window is halved.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default minimum spacing of periodic reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(3);

/// Default responder idle timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Spillway: adaptive windowed throughput driver for publish/subscribe messaging.
#[derive(Parser, Debug, Clone)]
#[command(name = "spillway")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// NATS server URLs (separated by comma)
    #[arg(short = 's', long = "server", env = "NATS_URL", default_value = DEFAULT_URL)]
    pub server: String,

    /// User credentials file
    #[arg(long, env = "NATS_CREDS")]
    pub creds: Option<PathBuf>,

    /// TLS client certificate file
    #[arg(long = "tlscert")]
    pub tls_cert: Option<PathBuf>,

    /// Private key file for the client certificate
    #[arg(long = "tlskey")]
    pub tls_key: Option<PathBuf>,

    /// CA certificate to verify the server against
    #[arg(long = "tlscacert")]
    pub tls_ca: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// OpenTelemetry collector endpoint for metrics export (optional)
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// Report format (text, json)
    #[arg(short, long, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Publish messages, pacing against the receiver's backlog
    Send(SendArgs),
    /// Receive messages and answer backlog probes
    Recv(RecvArgs),
    /// Run sender and receiver in one process over an in-memory broker
    Loopback(SendArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Subject to publish to
    pub subject: String,

    /// Payload size in bytes
    pub size: usize,

    /// Number of messages to window between probes
    #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
    pub window: u64,

    /// Window ceiling, as a multiple of the initial window
    #[arg(long, default_value_t = DEFAULT_CAP_FACTOR)]
    pub window_cap_factor: u64,

    /// Milliseconds to wait for a probe reply before halving the window
    #[arg(long, default_value_t = 2000)]
    pub probe_timeout_ms: u64,

    /// Minimum seconds between throughput reports
    #[arg(long, default_value_t = 3)]
    pub report_interval_secs: u64,

    /// Stop after this many messages (unlimited if unset)
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Tag each probe with a sequence number and ignore stale replies
    #[arg(long)]
    pub sequenced_probes: bool,
}

impl SendArgs {
    /// Convert to a run configuration.
    pub fn to_config(&self) -> SendConfig {
        SendConfig {
            subject: self.subject.clone(),
            payload_size: self.size,
            window: WindowConfig::from_initial(self.window, self.window_cap_factor),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            report_interval: Duration::from_secs(self.report_interval_secs),
            max_messages: self.count,
            sequenced_probes: self.sequenced_probes,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RecvArgs {
    /// Subject to subscribe to
    pub subject: String,

    /// Seconds without any message before giving up
    #[arg(long, default_value_t = 3600)]
    pub idle_timeout_secs: u64,

    /// Minimum seconds between receive reports
    #[arg(long, default_value_t = 3)]
    pub report_interval_secs: u64,

    /// Stop after this many messages (unlimited if unset)
    #[arg(short, long)]
    pub count: Option<u64>,
}

impl RecvArgs {
    /// Convert to a run configuration.
    pub fn to_config(&self) -> RecvConfig {
        RecvConfig {
            subject: self.subject.clone(),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            report_interval: Duration::from_secs(self.report_interval_secs),
            max_messages: self.count,
        }
    }
}

impl Cli {
    /// Connection settings from the global options.
    pub fn connect_config(&self) -> ConnectConfig {
        ConnectConfig {
            urls: self.server.clone(),
            name: CONNECTION_NAME.to_string(),
            creds: self.creds.clone(),
            tls_cert: self.tls_cert.clone(),
            tls_key: self.tls_key.clone(),
            tls_ca: self.tls_ca.clone(),
        }
    }
}

/// How to reach and authenticate with the messaging server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    /// Comma separated server URLs
    pub urls: String,
    pub name: String,
    pub creds: Option<PathBuf>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub tls_ca: Option<PathBuf>,
}

impl ConnectConfig {
    /// Certificate and key, when both are configured.
    pub fn client_cert(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    /// Check that the referenced files exist and TLS options are paired.
    pub fn validate(&self) -> Result<(), RunError> {
        if self.urls.trim().is_empty() {
            return Err(RunError::Config("server URL cannot be empty".into()));
        }
        if self.tls_cert.is_some() != self.tls_key.is_some() {
            return Err(RunError::Config(
                "--tlscert and --tlskey must be given together".into(),
            ));
        }

        let files = [&self.creds, &self.tls_cert, &self.tls_key, &self.tls_ca];
        for path in files.into_iter().flatten() {
            if !path.is_file() {
                return Err(RunError::Config(format!(
                    "file not found: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_URL.into(),
            name: CONNECTION_NAME.into(),
            creds: None,
            tls_cert: None,
            tls_key: None,
            tls_ca: None,
        }
    }
}

/// Publisher run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendConfig {
    pub subject: String,
    pub payload_size: usize,
    pub window: WindowConfig,
    pub probe_timeout: Duration,
    pub report_interval: Duration,
    /// Stop after this many messages
    pub max_messages: Option<u64>,
    /// Correlate probe replies by sequence number
    pub sequenced_probes: bool,
}

impl SendConfig {
    /// Create a configuration with defaults for everything but the target.
    pub fn new(subject: impl Into<String>, payload_size: usize) -> Self {
        Self {
            subject: subject.into(),
            payload_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        validate_subject(&self.subject)?;
        if self.payload_size > MAX_PAYLOAD_SIZE {
            return Err(RunError::Config(format!(
                "payload too large: {} bytes (max {} bytes)",
                self.payload_size, MAX_PAYLOAD_SIZE
            )));
        }
        if self.probe_timeout.is_zero() {
            return Err(RunError::Config("probe timeout must be positive".into()));
        }
        Ok(())
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            subject: "spillway".into(),
            payload_size: 128,
            window: WindowConfig::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
            max_messages: None,
            sequenced_probes: false,
        }
    }
}

/// Responder run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecvConfig {
    pub subject: String,
    pub idle_timeout: Duration,
    pub report_interval: Duration,
    /// Stop after this many messages
    pub max_messages: Option<u64>,
}

impl RecvConfig {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        validate_subject(&self.subject)?;
        if self.idle_timeout.is_zero() {
            return Err(RunError::Config("idle timeout must be positive".into()));
        }
        Ok(())
    }
}

impl Default for RecvConfig {
    fn default() -> Self {
        Self {
            subject: "spillway".into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            report_interval: DEFAULT_REPORT_INTERVAL,
            max_messages: None,
        }
    }
}

fn validate_subject(subject: &str) -> Result<(), RunError> {
    if subject.is_empty() {
        return Err(RunError::Config("subject cannot be empty".into()));
    }
    if subject.contains(char::is_whitespace) {
        return Err(RunError::Config(format!(
            "subject cannot contain whitespace: {subject:?}"
        )));
    }
    Ok(())
}
