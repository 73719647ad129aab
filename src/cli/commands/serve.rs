//! Implementation of the `cadence serve` command.

use anyhow::{anyhow, Result};
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::build_dispatcher;
use crate::adapters::http::{AppState, HttpServer};
use crate::domain::models::Config;
use crate::infrastructure::logging::Logger;

/// How long in-flight executions get to settle after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Arguments of `cadence serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(long, short)]
    pub port: Option<u16>,
}

impl ServeArgs {
    /// Override the server section of `config` with the flags given.
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref host) = self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

/// Run the server until a shutdown signal, then drain executions.
pub async fn execute(args: ServeArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);
    let _logger = Logger::init(&config.logging)?;

    let dispatcher = build_dispatcher(&config).await?;
    let streams = Arc::clone(dispatcher.streams());
    info!(
        mode = dispatcher.bridge().mode(),
        storage = ?config.storage.backend,
        streaming = config.execution.streaming,
        "cadence starting"
    );

    let server = HttpServer::new(AppState::new(Arc::clone(&dispatcher)), config.server.clone());
    server
        .serve_with_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow!("server error: {e}"))?;

    info!(in_flight = dispatcher.in_flight(), "server stopped, draining executions");
    if !dispatcher.shutdown(SHUTDOWN_GRACE).await {
        warn!(in_flight = dispatcher.in_flight(), "executions still running at shutdown");
    }
    streams.close_all().await;

    info!("cadence stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => warn!(error = %err, "failed to listen for ctrl-c, shutting down"),
    }
}
