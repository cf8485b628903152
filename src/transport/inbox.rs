//! Buffered delivery queue with a pending counter.
//!
//! Both transports deliver into an [`Inbox`]: the memory broker directly, the
//! NATS transport through a forwarding task. The counter tracks messages that
//! have been delivered but not yet taken by the receive loop, which is the
//! backlog a responder reports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{Message, Subscription};
use crate::error::TransportError;

/// Create a connected delivery queue.
pub fn inbox_channel() -> (InboxSender, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicU64::new(0));
    (
        InboxSender {
            tx,
            pending: Arc::clone(&pending),
        },
        Inbox { rx, pending },
    )
}

/// Delivering half of an inbox.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: mpsc::UnboundedSender<Message>,
    pending: Arc<AtomicU64>,
}

impl InboxSender {
    /// Queue a message. Returns false if the inbox was dropped.
    pub fn deliver(&self, msg: Message) -> bool {
        // Count first so the backlog never underflows on the receiving side
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(msg).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// True once the receiving half is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of an inbox.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Message>,
    pending: Arc<AtomicU64>,
}

impl Subscription for Inbox {
    async fn next_message(&mut self, timeout: Duration) -> Result<Option<Message>, TransportError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed),
            Ok(Some(msg)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(msg))
            }
        }
    }

    fn pending_count(&self) -> Result<u64, TransportError> {
        Ok(self.pending.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn msg(n: u8) -> Message {
        Message::new("bench", None, Bytes::from(vec![n]))
    }

    #[tokio::test]
    async fn test_pending_tracks_backlog() {
        let (tx, mut inbox) = inbox_channel();
        assert_eq!(inbox.pending_count().unwrap(), 0);

        for n in 0..3 {
            assert!(tx.deliver(msg(n)));
        }
        assert_eq!(inbox.pending_count().unwrap(), 3);

        let first = inbox
            .next_message(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.payload.as_ref(), &[0]);
        assert_eq!(inbox.pending_count().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_none() {
        let (_tx, mut inbox) = inbox_channel();
        let next = inbox.next_message(Duration::from_secs(5)).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_closed_when_sender_dropped() {
        let (tx, mut inbox) = inbox_channel();
        drop(tx);
        let err = inbox.next_message(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn test_deliver_to_dropped_inbox() {
        let (tx, inbox) = inbox_channel();
        drop(inbox);
        assert!(tx.is_closed());
        assert!(!tx.deliver(msg(1)));
    }
}
