//! Consumer-side receive loop.
//!
//! Counts every message and answers probes (messages carrying a reply
//! subject) with the subscription's current backlog.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RecvConfig;
use crate::error::RunError;
use crate::observability::metrics;
use crate::probe::encode_pending;
use crate::report::{RateMeter, Report, Reporter};
use crate::transport::{Message, Subscription, Transport};

pub struct Responder<T: Transport> {
    transport: Arc<T>,
    subscription: T::Subscription,
    subject: String,
    idle_timeout: Duration,
    max_messages: Option<u64>,
    meter: RateMeter,
    reporter: Reporter,
    received: u64,
}

impl<T: Transport> Responder<T> {
    /// Subscribe to `config.subject`.
    pub async fn subscribe(
        transport: Arc<T>,
        config: &RecvConfig,
        reporter: Reporter,
    ) -> Result<Self, RunError> {
        let subscription = transport
            .subscribe(&config.subject)
            .await
            .map_err(RunError::Subscribe)?;

        tracing::info!(subject = %config.subject, "Subscribed and waiting for messages");

        Ok(Self {
            transport,
            subscription,
            subject: config.subject.clone(),
            idle_timeout: config.idle_timeout,
            max_messages: config.max_messages,
            meter: RateMeter::new(config.report_interval),
            reporter,
            received: 0,
        })
    }

    /// Messages received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Receive until the message limit, or until a fatal receive outcome.
    ///
    /// Without a limit this only returns with an error; an idle period of
    /// `idle_timeout` yields [`RunError::IdleTimeout`].
    pub async fn run(&mut self) -> Result<u64, RunError> {
        while self.max_messages.map_or(true, |max| self.received < max) {
            let msg = self
                .subscription
                .next_message(self.idle_timeout)
                .await
                .map_err(RunError::Receive)?
                .ok_or(RunError::IdleTimeout(self.idle_timeout))?;

            self.handle(msg).await;
        }
        Ok(self.received)
    }

    /// Count a message and answer it if it is a probe.
    ///
    /// Returns the pending count sent back, if any.
    pub async fn handle(&mut self, msg: Message) -> Option<u64> {
        self.received += 1;
        metrics::record_received(&self.subject);

        let pending = match msg.reply {
            Some(reply) => Some(self.answer(&reply).await),
            None => None,
        };

        // Checked on every message, so a receiver seeing no probes still reports
        if self.meter.report_due() {
            self.reporter.emit(&Report::Received {
                received: self.received,
            });
        }
        pending
    }

    async fn answer(&self, reply: &str) -> u64 {
        let pending = self.subscription.pending_count().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Couldn't get pending message count");
            0
        });

        let payload = Bytes::copy_from_slice(&encode_pending(pending));
        if let Err(e) = self.transport.publish(reply, payload).await {
            tracing::warn!(error = %e, reply, "Failed to answer probe");
        }
        tracing::trace!(pending, "Answered probe");
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::decode_pending;
    use crate::transport::MemoryBroker;

    #[tokio::test]
    async fn test_probe_answered_with_backlog() {
        let broker = Arc::new(MemoryBroker::new());
        let config = RecvConfig {
            max_messages: Some(2),
            ..RecvConfig::new("bench")
        };
        let mut responder = Responder::subscribe(Arc::clone(&broker), &config, Reporter::default())
            .await
            .unwrap();
        let mut replies = broker.subscribe("_INBOX.r").await.unwrap();

        broker.publish("bench", Bytes::from_static(b"a")).await.unwrap();
        broker
            .publish_request("bench", "_INBOX.r", Bytes::from_static(b"p"))
            .await
            .unwrap();
        for _ in 0..3 {
            broker.publish("bench", Bytes::from_static(b"b")).await.unwrap();
        }

        assert_eq!(responder.run().await.unwrap(), 2);

        let reply = replies
            .next_message(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(decode_pending(&reply.payload), Ok(3));
    }

    #[tokio::test]
    async fn test_unsolicited_message_not_answered() {
        let broker = Arc::new(MemoryBroker::new());
        let mut responder =
            Responder::subscribe(Arc::clone(&broker), &RecvConfig::new("bench"), Reporter::default())
                .await
                .unwrap();

        let pending = responder
            .handle(Message::new("bench", None, Bytes::from_static(b"x")))
            .await;
        assert_eq!(pending, None);
        assert_eq!(responder.received(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_is_fatal() {
        let broker = Arc::new(MemoryBroker::new());
        let config = RecvConfig {
            idle_timeout: Duration::from_secs(5),
            ..RecvConfig::new("bench")
        };
        let mut responder = Responder::subscribe(broker, &config, Reporter::default())
            .await
            .unwrap();

        let err = responder.run().await.unwrap_err();
        assert!(matches!(err, RunError::IdleTimeout(d) if d == Duration::from_secs(5)));
    }
}
