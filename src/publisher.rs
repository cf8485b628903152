//! Publisher loop.
//!
//! Pushes unsolicited messages as fast as the window allows. Every time the
//! message index lands on a multiple of the window, one probe is issued; once
//! more than a window's worth of messages has followed it, the loop suspends
//! until the reply handler resolves the probe or the probe times out.

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SendConfig;
use crate::error::{RunError, TransportError};
use crate::flow::{FlowWindow, ProbeWaiter, WaitOutcome};
use crate::observability::metrics;
use crate::probe::{ProbeState, ProbeTracker, ReplyRoute};
use crate::report::{RateMeter, Report, Reporter};
use crate::transport::Transport;

/// What one iteration of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Published a message, nothing else.
    Sent,
    /// Published a message and issued a probe after it.
    ProbeIssued { seq: u64 },
    /// Published a message, then waited until the probe resolved.
    Resolved { window: u64 },
    /// Published a message, then gave up on the probe and halved the window.
    TimedOut { window: u64 },
}

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendSummary {
    pub sent: u64,
    pub probes: u64,
    pub probe_timeouts: u64,
    pub window: u64,
    pub elapsed: Duration,
}

impl SendSummary {
    pub fn report(&self) -> Report {
        Report::SendSummary {
            sent: self.sent,
            probes: self.probes,
            probe_timeouts: self.probe_timeouts,
            window: self.window,
            elapsed_secs: self.elapsed.as_secs_f64(),
        }
    }
}

pub struct Publisher<T> {
    transport: Arc<T>,
    subject: String,
    payload: Bytes,
    window: Arc<FlowWindow>,
    waiter: ProbeWaiter,
    route: ReplyRoute,
    tracker: ProbeTracker,
    probe: ProbeState,
    probe_timeout: Duration,
    meter: RateMeter,
    reporter: Reporter,
    sent: u64,
    probes: u64,
    probe_timeouts: u64,
}

impl<T: Transport> Publisher<T> {
    pub fn new(
        transport: Arc<T>,
        config: &SendConfig,
        window: Arc<FlowWindow>,
        waiter: ProbeWaiter,
        route: ReplyRoute,
        tracker: ProbeTracker,
        reporter: Reporter,
    ) -> Self {
        Self {
            transport,
            subject: config.subject.clone(),
            payload: Bytes::from(vec![0u8; config.payload_size]),
            window,
            waiter,
            route,
            tracker,
            probe: ProbeState::new(),
            probe_timeout: config.probe_timeout,
            meter: RateMeter::new(config.report_interval),
            reporter,
            sent: 0,
            probes: 0,
            probe_timeouts: 0,
        }
    }

    /// Messages published so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn probe(&self) -> &ProbeState {
        &self.probe
    }

    pub fn window(&self) -> u64 {
        self.window.current()
    }

    /// Run until `limit` messages are published, or forever without a limit.
    ///
    /// Only returns an error when the reply handler is gone.
    pub async fn run(&mut self, limit: Option<u64>) -> Result<SendSummary, RunError> {
        while limit.map_or(true, |max| self.sent < max) {
            self.step().await?;
        }
        Ok(self.summary())
    }

    /// Publish one message and apply the probe rules for its index.
    pub async fn step(&mut self) -> Result<Step, RunError> {
        if let Err(e) = self.transport.publish(&self.subject, self.payload.clone()).await {
            tracing::debug!(error = %e, "Publish failed");
        }
        self.sent += 1;
        metrics::record_sent(&self.subject);

        let w = self.window.current();
        let mut step = Step::Sent;

        if self.sent % w == 0 && !self.probe.in_progress() {
            let seq = self.issue_probe().await;
            step = Step::ProbeIssued { seq };
        }

        if self.probe.in_progress() && self.probe.record_sent() > w {
            step = self.await_probe(w).await?;
        }

        Ok(step)
    }

    async fn issue_probe(&mut self) -> u64 {
        let seq = self.probe.begin();
        if self.route.is_sequenced() {
            self.tracker.set(seq);
        }
        self.probes += 1;
        metrics::record_probe(&self.subject);

        let reply = self.route.reply_subject(seq);
        match self
            .transport
            .publish_request(&self.subject, &reply, self.payload.clone())
            .await
        {
            Ok(()) => {}
            Err(TransportError::NoResponders) => tracing::warn!("No responders."),
            Err(e) => tracing::warn!(error = %e, "Probe publish failed"),
        }
        seq
    }

    async fn await_probe(&mut self, w: u64) -> Result<Step, RunError> {
        let expected = self.route.is_sequenced().then(|| self.probe.seq());

        let step = match self.waiter.wait(self.probe_timeout, expected).await {
            WaitOutcome::Resolved(_) => Step::Resolved {
                window: self.window.current(),
            },
            WaitOutcome::TimedOut => {
                tracing::warn!(window = w, "Timeout waiting for receiver response.");
                let window = self.window.shrink_to_half();
                self.probe_timeouts += 1;
                metrics::record_probe_timeout(&self.subject);
                metrics::record_window(window);
                Step::TimedOut { window }
            }
            WaitOutcome::Closed => return Err(RunError::ReplyHandlerStopped),
        };

        self.probe.reset();
        self.tracker.clear();

        if self.meter.report_due() {
            let msgs_per_sec = self.meter.per_second(self.sent);
            self.reporter.emit(&Report::Throughput {
                window: w,
                msgs_per_sec: msgs_per_sec as u64,
                bytes_per_sec: (msgs_per_sec * self.payload.len() as f64) as u64,
            });
        }

        Ok(step)
    }

    pub fn summary(&self) -> SendSummary {
        SendSummary {
            sent: self.sent,
            probes: self.probes,
            probe_timeouts: self.probe_timeouts,
            window: self.window.current(),
            elapsed: self.meter.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{probe_signal, ProbeSignal, WindowConfig};
    use crate::transport::{MemoryBroker, Subscription};

    fn publisher(
        broker: &MemoryBroker,
        window: u64,
    ) -> (Publisher<MemoryBroker>, ProbeSignal, Arc<FlowWindow>) {
        let config = SendConfig {
            window: WindowConfig::from_initial(window, 50),
            ..SendConfig::new("bench", 16)
        };
        let flow = Arc::new(FlowWindow::new(window));
        let (signal, waiter) = probe_signal();
        let publisher = Publisher::new(
            Arc::new(broker.clone()),
            &config,
            Arc::clone(&flow),
            waiter,
            ReplyRoute::new("_INBOX.pub", false),
            ProbeTracker::new(),
            Reporter::default(),
        );
        (publisher, signal, flow)
    }

    #[tokio::test]
    async fn test_probe_issued_on_window_boundary() {
        let broker = MemoryBroker::new();
        let mut consumer = broker.subscribe("bench").await.unwrap();
        let (mut publisher, _signal, _) = publisher(&broker, 4);

        for _ in 0..3 {
            assert_eq!(publisher.step().await.unwrap(), Step::Sent);
        }
        assert_eq!(publisher.step().await.unwrap(), Step::ProbeIssued { seq: 1 });
        assert!(publisher.probe().in_progress());
        assert_eq!(publisher.probe().outstanding(), 1);

        // Four unsolicited messages, then the probe carrying a reply subject
        for _ in 0..4 {
            let msg = consumer.next_message(Duration::from_secs(1)).await.unwrap().unwrap();
            assert!(msg.reply.is_none());
        }
        let probe = consumer.next_message(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(probe.reply.as_deref(), Some("_INBOX.pub"));
        assert_eq!(probe.payload.len(), 16);
    }

    #[tokio::test]
    async fn test_no_second_probe_while_outstanding() {
        let broker = MemoryBroker::new();
        let _consumer = broker.subscribe("bench").await.unwrap();
        let (mut publisher, signal, _) = publisher(&broker, 2);

        assert_eq!(publisher.step().await.unwrap(), Step::Sent);
        assert_eq!(publisher.step().await.unwrap(), Step::ProbeIssued { seq: 1 });
        assert_eq!(publisher.step().await.unwrap(), Step::Sent);

        // Index 4 is a multiple of the window but a probe is in flight
        signal.notify(0).await;
        assert_eq!(publisher.step().await.unwrap(), Step::Resolved { window: 2 });
        assert_eq!(publisher.summary().probes, 1);
        assert!(!publisher.probe().in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_halves_window_and_resumes() {
        let broker = MemoryBroker::new();
        let _consumer = broker.subscribe("bench").await.unwrap();
        let (mut publisher, _signal, flow) = publisher(&broker, 8);

        // Probe at index 8, suspension once 9 messages follow it
        let mut last = Step::Sent;
        for _ in 0..16 {
            last = publisher.step().await.unwrap();
        }
        assert_eq!(last, Step::TimedOut { window: 4 });
        assert_eq!(flow.current(), 4);
        assert_eq!(publisher.probe().outstanding(), 0);
        assert!(!publisher.probe().in_progress());

        assert_eq!(publisher.step().await.unwrap(), Step::Sent);
        assert_eq!(publisher.summary().probe_timeouts, 1);
    }

    #[tokio::test]
    async fn test_handler_gone_stops_loop() {
        let broker = MemoryBroker::new();
        let _consumer = broker.subscribe("bench").await.unwrap();
        let (mut publisher, signal, _) = publisher(&broker, 1);
        drop(signal);

        let err = publisher.run(None).await.unwrap_err();
        assert!(matches!(err, RunError::ReplyHandlerStopped));
    }

    #[tokio::test]
    async fn test_run_stops_at_limit() {
        let broker = MemoryBroker::new();
        let (mut publisher, _signal, _) = publisher(&broker, 100);

        let summary = publisher.run(Some(50)).await.unwrap();
        assert_eq!(summary.sent, 50);
        assert_eq!(summary.probes, 0);
    }
}
