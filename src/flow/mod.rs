//! Flow control primitives.
//!
//! Provides:
//! - The adaptive flow window (AIMD growth and shrink)
//! - The single-slot signal between the reply handler and the publisher

pub mod signal;
pub mod window;

pub use signal::{probe_signal, ProbeSignal, ProbeWaiter, WaitOutcome};
pub use window::{FlowWindow, WindowConfig};
