//! Test utilities for Spillway integration tests.
//!
//! Provides:
//! - Scripted consumers on the in-memory broker
//! - Polling helpers

#![allow(dead_code)]

use bytes::Bytes;
use spillway::probe::encode_pending;
use spillway::transport::{Inbox, MemoryBroker, Message, Subscription, Transport};
use std::time::Duration;
use tokio::task::JoinHandle;

const FOREVER: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawn a consumer that answers every probe with an empty backlog.
pub async fn spawn_drained_consumer(broker: &MemoryBroker, subject: &str) -> JoinHandle<u64> {
    let mut sub = broker
        .subscribe(subject)
        .await
        .expect("failed to subscribe consumer");
    let broker = broker.clone();

    tokio::spawn(async move {
        let mut probes = 0;
        loop {
            match sub.next_message(FOREVER).await {
                Ok(Some(msg)) => {
                    if let Some(reply) = msg.reply {
                        probes += 1;
                        let payload = Bytes::copy_from_slice(&encode_pending(0));
                        broker
                            .publish(&reply, payload)
                            .await
                            .expect("reply publish failed");
                    }
                }
                Ok(None) => continue,
                Err(_) => break,
            }
        }
        probes
    })
}

/// Subscribe a consumer that never reads, so probes go unanswered.
pub async fn silent_consumer(broker: &MemoryBroker, subject: &str) -> Inbox {
    broker
        .subscribe(subject)
        .await
        .expect("failed to subscribe consumer")
}

/// Drain `sub` and return the first message carrying a reply subject.
pub async fn next_probe(sub: &mut Inbox) -> Option<Message> {
    while let Ok(Some(msg)) = sub.next_message(Duration::from_millis(1)).await {
        if msg.reply.is_some() {
            return Some(msg);
        }
    }
    None
}

/// Wait for a condition to become true with timeout.
///
/// # Returns
///
/// `true` if condition was met, `false` if timeout expired
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
