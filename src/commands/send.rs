//! Send command implementation.

use anyhow::Result;
use spillway::config::{Cli, SendArgs};
use spillway::report::Reporter;
use spillway::run_sender;

pub async fn run(cli: &Cli, args: &SendArgs) -> Result<()> {
    let config = args.to_config();
    config.validate()?;

    let transport = super::connect(cli).await?;
    let reporter = Reporter::new(cli.output);

    let summary = run_sender(transport, config, reporter).await?;
    reporter.emit(&summary.report());
    Ok(())
}
