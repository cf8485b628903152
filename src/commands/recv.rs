//! Recv command implementation.

use anyhow::Result;
use spillway::config::{Cli, RecvArgs};
use spillway::report::{Report, Reporter};
use spillway::run_receiver;

pub async fn run(cli: &Cli, args: &RecvArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;

    let transport = super::connect(cli).await?;
    let reporter = Reporter::new(cli.output);

    let received = run_receiver(transport, config, reporter).await?;
    reporter.emit(&Report::Received { received });
    Ok(())
}
