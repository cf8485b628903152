//! Single-slot signal from the probe reply handler to the publisher.
//!
//! - tokio::sync::mpsc with capacity 1
//! - The handler blocks while an earlier signal is still unread

use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::{timeout_at, Instant};

/// How a wait for a probe resolution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The reply handler resolved the probe with the given sequence number.
    Resolved(u64),
    /// No accepted signal arrived before the deadline.
    TimedOut,
    /// The reply handler is gone.
    Closed,
}

/// Create a connected signal pair.
pub fn probe_signal() -> (ProbeSignal, ProbeWaiter) {
    let (tx, rx) = mpsc::channel(1);
    (ProbeSignal { tx }, ProbeWaiter { rx })
}

/// Sending half, owned by the probe reply handler.
#[derive(Debug, Clone)]
pub struct ProbeSignal {
    tx: Sender<u64>,
}

impl ProbeSignal {
    /// Signal that the probe `seq` resolved.
    ///
    /// Waits while the slot is occupied. Returns false if the publisher is gone.
    pub async fn notify(&self, seq: u64) -> bool {
        self.tx.send(seq).await.is_ok()
    }
}

/// Receiving half, owned by the publisher loop.
#[derive(Debug)]
pub struct ProbeWaiter {
    rx: Receiver<u64>,
}

impl ProbeWaiter {
    /// Wait up to `timeout` for a signal.
    ///
    /// With `expected` set, signals carrying another sequence number are
    /// discarded and the wait continues until the same deadline. Without it,
    /// any signal resolves the wait, including a late one left over from an
    /// abandoned probe.
    pub async fn wait(&mut self, timeout: Duration, expected: Option<u64>) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            match timeout_at(deadline, self.rx.recv()).await {
                Err(_) => return WaitOutcome::TimedOut,
                Ok(None) => return WaitOutcome::Closed,
                Ok(Some(seq)) => match expected {
                    Some(want) if want != seq => {
                        tracing::debug!(seq, expected = want, "Discarding stale probe signal");
                    }
                    _ => return WaitOutcome::Resolved(seq),
                },
            }
        }
    }
}
