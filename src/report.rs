//! Rate statistics and periodic report output.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// A line of user-visible output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    /// Periodic publisher throughput.
    Throughput {
        window: u64,
        msgs_per_sec: u64,
        bytes_per_sec: u64,
    },
    /// Periodic responder progress.
    Received { received: u64 },
    /// Final publisher summary.
    SendSummary {
        sent: u64,
        probes: u64,
        probe_timeouts: u64,
        window: u64,
        elapsed_secs: f64,
    },
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throughput {
                window,
                msgs_per_sec,
                bytes_per_sec,
            } => write!(
                f,
                "Window: {window}, Rate: {msgs_per_sec} msgs/sec, {}/sec",
                format_bytes_iec(*bytes_per_sec)
            ),
            Self::Received { received } => write!(f, "Received {received} messages."),
            Self::SendSummary {
                sent,
                probes,
                probe_timeouts,
                window,
                elapsed_secs,
            } => write!(
                f,
                "Sent {sent} messages in {elapsed_secs:.2}s ({probes} probes, \
                 {probe_timeouts} timeouts, final window {window})"
            ),
        }
    }
}

/// Writes reports to stdout in the configured format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn emit(&self, report: &Report) {
        match self.format {
            OutputFormat::Text => println!("{report}"),
            OutputFormat::Json => match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "Failed to encode report"),
            },
        }
    }
}

/// Elapsed-time bookkeeping for rates and report pacing.
#[derive(Debug, Clone)]
pub struct RateMeter {
    start: Instant,
    last_report: Instant,
    interval: Duration,
}

impl RateMeter {
    pub fn new(interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_report: now,
            interval,
        }
    }

    /// True at most once per interval; restarts the interval when it fires.
    pub fn report_due(&mut self) -> bool {
        if self.last_report.elapsed() > self.interval {
            self.last_report = Instant::now();
            true
        } else {
            false
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Average events per second since the meter started.
    pub fn per_second(&self, count: u64) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            count as f64 / secs
        } else {
            0.0
        }
    }
}

/// Format a byte count with binary (IEC) units, e.g. `1.5 KiB`.
pub fn format_bytes_iec(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {prefix}iB", bytes as f64 / div as f64)
}
