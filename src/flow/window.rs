//! Adaptive flow window.
//!
//! - AtomicU64 for lock-free window accounting
//! - Additive increase on drain signals, multiplicative decrease on timeouts

use std::sync::atomic::{AtomicU64, Ordering};

/// Default initial window, in messages.
pub const DEFAULT_WINDOW: u64 = 1024;

/// Default ceiling, as a multiple of the growth step.
pub const DEFAULT_CAP_FACTOR: u64 = 50;

/// Number of messages the publisher lets through before it must synchronize
/// with the consumer.
///
/// The size is never below 1. Growth happens only from the probe reply
/// handler and shrinking only from the publisher's timeout branch; each is a
/// single atomic read-modify-write, so no lock is needed.
#[derive(Debug)]
pub struct FlowWindow {
    size: AtomicU64,
}

impl FlowWindow {
    /// Create a window with the given initial size (0 is raised to 1).
    pub fn new(initial: u64) -> Self {
        Self {
            size: AtomicU64::new(initial.max(1)),
        }
    }

    /// Current window size.
    pub fn current(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    /// Add `step`, never exceeding `cap`.
    ///
    /// A window already at or above `cap` is left as is. Returns the new size.
    pub fn grow_by(&self, step: u64, cap: u64) -> u64 {
        let prev = self
            .size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                Some(grown(w, step, cap))
            })
            .unwrap_or_else(|w| w);
        grown(prev, step, cap)
    }

    /// Halve the window, flooring at 1. Returns the new size.
    pub fn shrink_to_half(&self) -> u64 {
        let prev = self
            .size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| Some(halved(w)))
            .unwrap_or_else(|w| w);
        halved(prev)
    }
}

fn grown(w: u64, step: u64, cap: u64) -> u64 {
    if w >= cap {
        w
    } else {
        w.saturating_add(step).min(cap)
    }
}

fn halved(w: u64) -> u64 {
    (w / 2).max(1)
}

/// Window sizing: initial size, growth step and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub initial: u64,
    pub step: u64,
    pub cap: u64,
}

impl WindowConfig {
    /// Step equal to the initial window and a ceiling of `cap_factor` steps.
    pub fn from_initial(initial: u64, cap_factor: u64) -> Self {
        let initial = initial.max(1);
        Self {
            initial,
            step: initial,
            cap: initial.saturating_mul(cap_factor).max(initial),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::from_initial(DEFAULT_WINDOW, DEFAULT_CAP_FACTOR)
    }
}
