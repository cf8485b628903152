//! In-process broker.
//!
//! Routes messages between subscriptions of the same process with the same
//! observable behavior the flow-control core relies on: subject wildcards,
//! per-subscription pending counts, and a no-responders status delivered to
//! the reply subject of an unanswered request.

use bytes::Bytes;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::{inbox_channel, subject_matches, Inbox, InboxSender, Message, Transport};
use crate::error::TransportError;

#[derive(Debug)]
struct Route {
    pattern: String,
    sender: InboxSender,
}

/// Shared in-process broker. Clones share the same routing table.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    routes: Arc<Mutex<Vec<Route>>>,
}

impl MemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions matching `subject`.
    pub fn interest(&self, subject: &str) -> usize {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|r| !r.sender.is_closed());
        routes
            .iter()
            .filter(|r| subject_matches(&r.pattern, subject))
            .count()
    }

    /// Deliver to every matching subscription and return how many got it.
    fn route(&self, msg: &Message) -> usize {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.retain(|r| !r.sender.is_closed());
        routes
            .iter()
            .filter(|r| subject_matches(&r.pattern, &msg.subject))
            .filter(|r| r.sender.deliver(msg.clone()))
            .count()
    }
}

impl Transport for MemoryBroker {
    type Subscription = Inbox;

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.route(&Message::new(subject, None, payload));
        Ok(())
    }

    async fn publish_request(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let delivered = self.route(&Message::new(subject, Some(reply.to_string()), payload));
        if delivered == 0 {
            self.route(&Message::no_responders(reply));
            return Err(TransportError::NoResponders);
        }
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Inbox, TransportError> {
        if subject.is_empty() || subject.split('.').any(str::is_empty) {
            return Err(TransportError::Subscribe(format!(
                "invalid subject: {subject:?}"
            )));
        }

        let (sender, inbox) = inbox_channel();
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Route {
                pattern: subject.to_string(),
                sender,
            });
        Ok(inbox)
    }

    fn new_inbox(&self) -> String {
        format!("_INBOX.{}", Uuid::now_v7().simple())
    }

    async fn flush(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn server_name(&self) -> String {
        "memory".to_string()
    }
}
