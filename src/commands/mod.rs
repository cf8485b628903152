//! Command implementations for the `spillway` binary.

pub mod loopback;
pub mod recv;
pub mod send;

use anyhow::{Context, Result};
use spillway::config::Cli;
use spillway::transport::{NatsTransport, Transport};
use spillway::RunError;
use std::sync::Arc;

/// Validate the connection options and connect.
pub async fn connect(cli: &Cli) -> Result<Arc<NatsTransport>> {
    let config = cli.connect_config();
    config.validate()?;

    let transport = NatsTransport::connect(&config)
        .await
        .map_err(RunError::Connect)
        .with_context(|| format!("failed to connect to {}", config.urls))?;

    tracing::info!(server = %transport.server_name(), "Connected to server");
    Ok(Arc::new(transport))
}
