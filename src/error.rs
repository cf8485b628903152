//! Error types shared across the transport seam and the runners.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a messaging transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to publish: {0}")]
    Publish(String),

    /// A request was published but nobody is subscribed to the subject.
    #[error("no responders available for request")]
    NoResponders,

    #[error("failed to subscribe: {0}")]
    Subscribe(String),

    #[error("failed to flush: {0}")]
    Flush(String),

    #[error("subscription closed")]
    Closed,
}

/// Fatal outcomes of a send or receive run.
///
/// Recoverable conditions (probe timeouts, missing responders on a single
/// probe) are handled inside the publisher loop and never surface here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("couldn't connect: {0}")]
    Connect(#[source] TransportError),

    #[error("couldn't subscribe: {0}")]
    Subscribe(#[source] TransportError),

    #[error("couldn't retrieve next message: {0}")]
    Receive(#[source] TransportError),

    /// A probe reply carried the no-responders status.
    #[error("no service available, start the receiver")]
    ConsumerAbsent,

    /// The responder saw no message for the whole idle period.
    #[error("timeout: no message received for {0:?}")]
    IdleTimeout(Duration),

    #[error("probe reply handler stopped unexpectedly")]
    ReplyHandlerStopped,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RunError {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
