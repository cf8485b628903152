//! Probe reply handler.
//!
//! Runs as its own task, reading the reply subscription. A reply reporting an
//! empty backlog grows the flow window; every accepted reply resolves the
//! publisher's outstanding probe through the single-slot signal.

use std::sync::Arc;
use std::time::Duration;

use super::codec::decode_pending;
use super::{ProbeTracker, ReplyRoute};
use crate::error::RunError;
use crate::flow::{FlowWindow, ProbeSignal, WindowConfig};
use crate::observability::metrics;
use crate::transport::{Message, Subscription};

/// How long a single receive waits before polling again.
const REPLY_POLL: Duration = Duration::from_secs(60 * 60);

/// Additive increase applied on a drain signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    pub step: u64,
    pub cap: u64,
}

impl From<WindowConfig> for GrowthPolicy {
    fn from(config: WindowConfig) -> Self {
        Self {
            step: config.step,
            cap: config.cap,
        }
    }
}

/// What a single reply did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Empty or undecodable reply; no signal is sent.
    Ignored,
    /// Reply to a probe that is no longer outstanding (sequenced routing only).
    Stale { seq: u64 },
    /// The probe resolved; `window` is the size after any growth.
    Resolved { seq: u64, pending: u64, window: u64 },
}

/// Consumes probe replies and drives window growth.
pub struct ProbeReplyHandler<S> {
    replies: S,
    window: Arc<FlowWindow>,
    policy: GrowthPolicy,
    signal: ProbeSignal,
    route: ReplyRoute,
    tracker: ProbeTracker,
}

impl<S: Subscription> ProbeReplyHandler<S> {
    pub fn new(
        replies: S,
        window: Arc<FlowWindow>,
        policy: GrowthPolicy,
        signal: ProbeSignal,
        route: ReplyRoute,
        tracker: ProbeTracker,
    ) -> Self {
        Self {
            replies,
            window,
            policy,
            signal,
            route,
            tracker,
        }
    }

    /// Process replies until a fatal condition or until the publisher is gone.
    pub async fn run(mut self) -> Result<(), RunError> {
        loop {
            let msg = match self.replies.next_message(REPLY_POLL).await {
                Ok(Some(msg)) => msg,
                Ok(None) => continue,
                Err(e) => return Err(RunError::Receive(e)),
            };

            if let ReplyOutcome::Resolved { seq, .. } = self.handle(&msg)? {
                if !self.signal.notify(seq).await {
                    tracing::debug!("Publisher gone, stopping reply handler");
                    return Ok(());
                }
            }
        }
    }

    /// Apply one reply to the window.
    ///
    /// Fails only when the reply says the consumer side has no responders.
    pub fn handle(&self, msg: &Message) -> Result<ReplyOutcome, RunError> {
        if msg.is_no_responders() {
            tracing::error!("No service available - start the receiver");
            return Err(RunError::ConsumerAbsent);
        }
        if msg.payload.is_empty() {
            return Ok(ReplyOutcome::Ignored);
        }

        let seq = if self.route.is_sequenced() {
            let Some(seq) = self.route.parse_seq(&msg.subject) else {
                tracing::warn!(subject = %msg.subject, "Reply on unexpected subject");
                return Ok(ReplyOutcome::Ignored);
            };
            if self.tracker.current() != Some(seq) {
                tracing::debug!(seq, "Ignoring reply to an abandoned probe");
                return Ok(ReplyOutcome::Stale { seq });
            }
            seq
        } else {
            0
        };

        let pending = match decode_pending(&msg.payload) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed probe reply");
                return Ok(ReplyOutcome::Ignored);
            }
        };

        // Grow only on a verified empty backlog, one step at a time
        let window = if pending == 0 {
            let window = self.window.grow_by(self.policy.step, self.policy.cap);
            metrics::record_window(window);
            tracing::trace!(window, "Receiver drained, window grown");
            window
        } else {
            self.window.current()
        };

        Ok(ReplyOutcome::Resolved {
            seq,
            pending,
            window,
        })
    }
}
