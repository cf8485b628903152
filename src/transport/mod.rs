//! Messaging transport seam.
//!
//! The flow-control core only needs fire-and-forget publish, request publish
//! with an explicit reply subject, and synchronous subscriptions that expose
//! their pending count. Two implementations are provided:
//!
//! - [`nats::NatsTransport`]: a NATS client connection
//! - [`memory::MemoryBroker`]: an in-process broker for tests and loopback runs

mod inbox;
pub mod memory;
pub mod nats;

use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::error::TransportError;

pub use inbox::{inbox_channel, Inbox, InboxSender};
pub use memory::MemoryBroker;
pub use nats::NatsTransport;

/// Header carrying a transport status code.
pub const STATUS_HEADER: &str = "Status";

/// Status code sent to a reply subject when a request had no responders.
pub const NO_RESPONDERS_STATUS: u16 = 503;

/// A delivered message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    /// Reply subject; present on probes, absent on unsolicited messages.
    pub reply: Option<String>,
    pub payload: Bytes,
    pub headers: HashMap<String, String>,
}

impl Message {
    /// Create a message without headers.
    pub fn new(subject: impl Into<String>, reply: Option<String>, payload: Bytes) -> Self {
        Self {
            subject: subject.into(),
            reply,
            payload,
            headers: HashMap::new(),
        }
    }

    /// Create an empty status message telling `subject` that nobody answered.
    pub fn no_responders(subject: impl Into<String>) -> Self {
        let mut msg = Self::new(subject, None, Bytes::new());
        msg.headers
            .insert(STATUS_HEADER.to_string(), NO_RESPONDERS_STATUS.to_string());
        msg
    }

    /// Status code from the status header, if any.
    pub fn status(&self) -> Option<u16> {
        self.headers
            .get(STATUS_HEADER)
            .and_then(|s| s.trim().parse().ok())
    }

    /// True if this message reports that a request had no responders.
    pub fn is_no_responders(&self) -> bool {
        self.status() == Some(NO_RESPONDERS_STATUS)
    }
}

/// A connection able to publish and subscribe.
pub trait Transport: Send + Sync + 'static {
    type Subscription: Subscription;

    /// Best-effort publish with no reply expected.
    fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Publish a request whose reply goes to `reply`.
    ///
    /// May fail with [`TransportError::NoResponders`] when the transport knows
    /// nobody is subscribed to `subject`.
    fn publish_request(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Open a synchronous subscription.
    fn subscribe(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<Self::Subscription, TransportError>> + Send;

    /// A reply subject unique to this connection.
    fn new_inbox(&self) -> String;

    /// Flush buffered outbound messages.
    fn flush(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Name of the server this connection talks to.
    fn server_name(&self) -> String;
}

/// A synchronous subscription.
pub trait Subscription: Send + 'static {
    /// Next message, or `None` if nothing arrived within `timeout`.
    fn next_message(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Message>, TransportError>> + Send;

    /// Messages delivered to this subscription but not yet returned by
    /// [`Subscription::next_message`].
    fn pending_count(&self) -> Result<u64, TransportError>;
}

/// Match a subject against a pattern with `*` (one token) and `>` (the rest).
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_tokens = subject.split('.');
    for token in pattern.split('.') {
        match (token, subject_tokens.next()) {
            (">", Some(_)) => return true,
            ("*", Some(_)) => {}
            (expected, Some(actual)) if expected == actual => {}
            _ => return false,
        }
    }
    subject_tokens.next().is_none()
}
