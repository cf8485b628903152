//! Loopback command implementation.
//!
//! Runs the responder and the sender in one process over the in-memory
//! broker. Useful for exercising the flow control without a server.

use anyhow::{Context, Result};
use spillway::config::{Cli, RecvConfig, SendArgs};
use spillway::report::Reporter;
use spillway::responder::Responder;
use spillway::run_sender;
use spillway::transport::MemoryBroker;
use std::sync::Arc;

pub async fn run(cli: &Cli, args: &SendArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;

    let broker = Arc::new(MemoryBroker::new());
    let reporter = Reporter::new(cli.output);

    // Subscribe before the first probe goes out
    let mut responder =
        Responder::subscribe(Arc::clone(&broker), &RecvConfig::new(&config.subject), reporter)
            .await
            .context("loopback responder failed to subscribe")?;
    let receiver = tokio::spawn(async move { responder.run().await });

    let summary = run_sender(broker, config, reporter)
        .await
        .context("loopback sender failed")?;
    receiver.abort();

    reporter.emit(&summary.report());
    Ok(())
}
