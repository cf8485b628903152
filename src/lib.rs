//! Spillway: adaptive windowed throughput driver for publish/subscribe messaging.
//!
//! A publisher streams fire-and-forget messages at a subject while a remote
//! responder drains them. Every `window` messages the publisher probes the
//! responder's backlog with a request/reply round trip and adjusts the window:
//! a drained backlog grows it by a fixed step, a probe timeout halves it.
//!
//! # Architecture
//!
//! - **Flow Window**: lock-free `AtomicU64` budget shared by the publisher and
//!   the reply handler
//! - **Publisher Loop**: emits messages and suspends on a capacity-1 signal
//!   while a probe is outstanding
//! - **Probe Reply Handler**: dedicated task that decodes replies and grows the
//!   window
//! - **Responder**: sequential receive loop that answers probes with its
//!   pending count
//!
//! # Modules
//!
//! - [`config`]: CLI and library configuration
//! - [`error`]: Transport and run error types
//! - [`flow`]: Flow window and probe signal channel
//! - [`observability`]: Metrics and tracing setup
//! - [`probe`]: Probe wire codec, reply routing and reply handler
//! - [`publisher`]: Publisher loop
//! - [`report`]: Rate statistics and report output
//! - [`responder`]: Consumer-side receive loop
//! - [`runner`]: Top-level send/receive operations
//! - [`transport`]: Messaging transport seam (NATS and in-memory)

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions,    // probe::ProbeState is fine
    clippy::must_use_candidate,         // Not all functions need #[must_use]
    clippy::missing_errors_doc,         // Error docs can be verbose
    clippy::missing_panics_doc,         // Panic docs can be verbose
    clippy::cast_precision_loss,        // Rates are approximate
    clippy::cast_possible_truncation,   // Rates are approximate
    clippy::cast_sign_loss              // Rates are never negative
)]

pub mod config;
pub mod error;
pub mod flow;
pub mod observability;
pub mod probe;
pub mod publisher;
pub mod report;
pub mod responder;
pub mod runner;
pub mod transport;

pub use error::{RunError, TransportError};
pub use flow::window::FlowWindow;
pub use runner::{run_receiver, run_sender};
