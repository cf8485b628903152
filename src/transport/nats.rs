//! NATS transport backed by `async-nats`.

use async_nats::{Client, ConnectOptions};
use bytes::Bytes;
use futures::StreamExt;

use super::{inbox_channel, Inbox, Message, Transport, STATUS_HEADER};
use crate::config::ConnectConfig;
use crate::error::TransportError;

/// A NATS client connection.
#[derive(Debug, Clone)]
pub struct NatsTransport {
    client: Client,
}

impl NatsTransport {
    /// Connect to the servers in `config.urls` (comma separated).
    #[tracing::instrument(skip(config), fields(urls = %config.urls))]
    pub async fn connect(config: &ConnectConfig) -> Result<Self, TransportError> {
        let mut options = ConnectOptions::new().name(&config.name);

        if let Some(creds) = &config.creds {
            options = options
                .credentials_file(creds)
                .await
                .map_err(|e| TransportError::Connect(format!("credentials file: {e}")))?;
        }

        if let Some((cert, key)) = config.client_cert() {
            options = options.add_client_certificate(cert.to_path_buf(), key.to_path_buf());
        }

        if let Some(ca) = &config.tls_ca {
            options = options.add_root_certificates(ca.clone());
        }

        let client = options
            .connect(config.urls.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self { client })
    }
}

fn convert(msg: async_nats::Message) -> Message {
    let mut converted = Message::new(
        msg.subject.to_string(),
        msg.reply.map(|r| r.to_string()),
        msg.payload,
    );
    if let Some(status) = msg.status {
        converted
            .headers
            .insert(STATUS_HEADER.to_string(), status.as_u16().to_string());
    }
    converted
}

impl Transport for NatsTransport {
    type Subscription = Inbox;

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn publish_request(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        // NATS reports missing responders as a status reply on `reply`
        self.client
            .publish_with_reply(subject.to_string(), reply.to_string(), payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))
    }

    async fn subscribe(&self, subject: &str) -> Result<Inbox, TransportError> {
        let mut subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))?;

        // The client exposes no backlog; forwarding into an inbox gives the
        // responder a pending count.
        let (sender, inbox) = inbox_channel();
        let subject = subject.to_string();
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                if !sender.deliver(convert(msg)) {
                    break;
                }
            }
            tracing::debug!(subject = %subject, "Subscription forwarder stopped");
        });

        Ok(inbox)
    }

    fn new_inbox(&self) -> String {
        self.client.new_inbox()
    }

    async fn flush(&self) -> Result<(), TransportError> {
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::Flush(e.to_string()))
    }

    fn server_name(&self) -> String {
        self.client.server_info().server_name
    }
}
