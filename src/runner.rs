//! Top-level send and receive operations.
//!
//! Fatal conditions come back as [`RunError`] values; only the binary turns
//! them into a process exit code.

use std::sync::Arc;

use crate::config::{RecvConfig, SendConfig};
use crate::error::RunError;
use crate::flow::{probe_signal, FlowWindow};
use crate::probe::{ProbeReplyHandler, ProbeTracker, ReplyRoute};
use crate::publisher::{Publisher, SendSummary};
use crate::report::Reporter;
use crate::responder::Responder;
use crate::transport::Transport;

/// A wired-up sending side: the publisher loop and its reply handler.
pub struct Sender<T: Transport> {
    pub publisher: Publisher<T>,
    pub handler: ProbeReplyHandler<T::Subscription>,
    pub window: Arc<FlowWindow>,
    max_messages: Option<u64>,
}

impl<T: Transport> Sender<T> {
    /// Subscribe to the run's reply inbox and build both halves.
    pub async fn prepare(
        transport: Arc<T>,
        config: &SendConfig,
        reporter: Reporter,
    ) -> Result<Self, RunError> {
        config.validate()?;

        let route = ReplyRoute::new(transport.new_inbox(), config.sequenced_probes);
        let replies = transport
            .subscribe(&route.subscription_subject())
            .await
            .map_err(RunError::Subscribe)?;

        let window = Arc::new(FlowWindow::new(config.window.initial));
        let (signal, waiter) = probe_signal();
        let tracker = ProbeTracker::new();

        let handler = ProbeReplyHandler::new(
            replies,
            Arc::clone(&window),
            config.window.into(),
            signal,
            route.clone(),
            tracker.clone(),
        );
        let publisher = Publisher::new(
            transport,
            config,
            Arc::clone(&window),
            waiter,
            route,
            tracker,
            reporter,
        );

        Ok(Self {
            publisher,
            handler,
            window,
            max_messages: config.max_messages,
        })
    }

    /// Run the publisher with the reply handler on its own task.
    pub async fn run(self) -> Result<SendSummary, RunError> {
        let Self {
            mut publisher,
            handler,
            max_messages,
            ..
        } = self;
        let mut handler_task = tokio::spawn(handler.run());

        tokio::select! {
            biased;

            joined = &mut handler_task => Err(handler_failure(joined)),
            result = publisher.run(max_messages) => match result {
                // The handler closed the signal; report why it stopped
                Err(RunError::ReplyHandlerStopped) => Err(handler_failure(handler_task.await)),
                other => {
                    handler_task.abort();
                    other
                }
            },
        }
    }
}

fn handler_failure(joined: Result<Result<(), RunError>, tokio::task::JoinError>) -> RunError {
    match joined {
        Ok(Err(e)) => e,
        Ok(Ok(())) => RunError::ReplyHandlerStopped,
        Err(e) => {
            tracing::error!(error = %e, "Reply handler task failed");
            RunError::ReplyHandlerStopped
        }
    }
}

/// Drive messages at `config.subject` until the limit or a fatal error.
#[tracing::instrument(skip_all, fields(subject = %config.subject, window = config.window.initial))]
pub async fn run_sender<T: Transport>(
    transport: Arc<T>,
    config: SendConfig,
    reporter: Reporter,
) -> Result<SendSummary, RunError> {
    let sender = Sender::prepare(Arc::clone(&transport), &config, reporter).await?;
    let summary = sender.run().await?;

    if let Err(e) = transport.flush().await {
        tracing::warn!(error = %e, "Flush failed");
    }
    Ok(summary)
}

/// Receive and answer probes on `config.subject` until the limit or a fatal
/// error. Returns the number of messages received.
#[tracing::instrument(skip_all, fields(subject = %config.subject))]
pub async fn run_receiver<T: Transport>(
    transport: Arc<T>,
    config: RecvConfig,
    reporter: Reporter,
) -> Result<u64, RunError> {
    config.validate()?;
    let mut responder = Responder::subscribe(Arc::clone(&transport), &config, reporter).await?;
    let received = responder.run().await?;

    if let Err(e) = transport.flush().await {
        tracing::warn!(error = %e, "Flush failed");
    }
    Ok(received)
}
