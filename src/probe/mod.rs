//! Backlog probes.
//!
//! A probe is a request carrying the benchmark payload; the responder answers
//! it with its pending count. This module holds the publisher-side probe
//! bookkeeping, the reply subject scheme and the reply handler task.

pub mod codec;
pub mod handler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use codec::{decode_pending, encode_pending, ProbeError};
pub use handler::{GrowthPolicy, ProbeReplyHandler, ReplyOutcome};

/// Publisher-side state of the single in-flight probe.
///
/// Owned by the publisher loop; `in_progress` and `outstanding` always reset
/// together.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeState {
    in_progress: bool,
    outstanding: u64,
    seq: u64,
}

impl ProbeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new probe and return its sequence number (starting at 1).
    pub fn begin(&mut self) -> u64 {
        self.seq += 1;
        self.in_progress = true;
        self.outstanding = 0;
        self.seq
    }

    /// Count one message sent while the probe is in flight.
    pub fn record_sent(&mut self) -> u64 {
        self.outstanding += 1;
        self.outstanding
    }

    /// Forget the current probe.
    pub fn reset(&mut self) {
        self.in_progress = false;
        self.outstanding = 0;
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    /// Sequence number of the most recent probe (0 before the first).
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Reply subject scheme for probes.
///
/// Plain routing sends every reply to the run's inbox. Sequenced routing
/// appends the probe sequence number so stale replies can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRoute {
    inbox: String,
    sequenced: bool,
}

impl ReplyRoute {
    pub fn new(inbox: impl Into<String>, sequenced: bool) -> Self {
        Self {
            inbox: inbox.into(),
            sequenced,
        }
    }

    pub fn is_sequenced(&self) -> bool {
        self.sequenced
    }

    /// Subject the reply handler subscribes to.
    pub fn subscription_subject(&self) -> String {
        if self.sequenced {
            format!("{}.*", self.inbox)
        } else {
            self.inbox.clone()
        }
    }

    /// Reply subject for probe `seq`.
    pub fn reply_subject(&self, seq: u64) -> String {
        if self.sequenced {
            format!("{}.{seq}", self.inbox)
        } else {
            self.inbox.clone()
        }
    }

    /// Sequence number encoded in a reply subject, if routing is sequenced.
    pub fn parse_seq(&self, subject: &str) -> Option<u64> {
        if !self.sequenced {
            return None;
        }
        subject
            .strip_prefix(self.inbox.as_str())?
            .strip_prefix('.')?
            .parse()
            .ok()
    }
}

/// Sequence number of the probe the publisher currently waits on.
///
/// Only consulted with sequenced routing; 0 means no probe is in flight.
#[derive(Debug, Clone, Default)]
pub struct ProbeTracker {
    current: Arc<AtomicU64>,
}

impl ProbeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seq: u64) {
        self.current.store(seq, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.current.store(0, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<u64> {
        match self.current.load(Ordering::SeqCst) {
            0 => None,
            seq => Some(seq),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_state_lifecycle() {
        let mut state = ProbeState::new();
        assert!(!state.in_progress());

        assert_eq!(state.begin(), 1);
        assert!(state.in_progress());
        assert_eq!(state.record_sent(), 1);
        assert_eq!(state.record_sent(), 2);

        state.reset();
        assert!(!state.in_progress());
        assert_eq!(state.outstanding(), 0);

        assert_eq!(state.begin(), 2);
        assert_eq!(state.outstanding(), 0);
    }

    #[test]
    fn test_plain_route() {
        let route = ReplyRoute::new("_INBOX.run", false);
        assert_eq!(route.subscription_subject(), "_INBOX.run");
        assert_eq!(route.reply_subject(5), "_INBOX.run");
        assert_eq!(route.parse_seq("_INBOX.run"), None);
    }

    #[test]
    fn test_sequenced_route() {
        let route = ReplyRoute::new("_INBOX.run", true);
        assert_eq!(route.subscription_subject(), "_INBOX.run.*");
        assert_eq!(route.reply_subject(5), "_INBOX.run.5");
        assert_eq!(route.parse_seq("_INBOX.run.5"), Some(5));
        assert_eq!(route.parse_seq("_INBOX.runner.5"), None);
        assert_eq!(route.parse_seq("_INBOX.run.x"), None);
    }

    #[test]
    fn test_tracker() {
        let tracker = ProbeTracker::new();
        assert_eq!(tracker.current(), None);
        tracker.set(3);
        assert_eq!(tracker.clone().current(), Some(3));
        tracker.clear();
        assert_eq!(tracker.current(), None);
    }
}
