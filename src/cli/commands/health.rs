//! Implementation of the `cadence health` command.

use anyhow::{bail, Result};
use serde::Serialize;

use super::build_bridge;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Health of the configured execution backend.
#[derive(Debug, Serialize)]
pub struct HealthOutput {
    /// `mock` or `remote`.
    pub mode: &'static str,
    /// Remote endpoint, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Whether the backend answered.
    pub healthy: bool,
}

impl CommandOutput for HealthOutput {
    fn to_human(&self) -> String {
        let target = self.endpoint.as_deref().map_or_else(String::new, |e| format!(" ({e})"));
        let state = if self.healthy { "healthy" } else { "unreachable" };
        format!("Execution backend: {}{target} is {state}", self.mode)
    }
}

/// Probe the backend and report. Fails when it is unreachable.
pub async fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let bridge = build_bridge(config)?;
    let result = HealthOutput {
        mode: bridge.mode(),
        endpoint: config.execution.remote().map(|(endpoint, _)| endpoint.to_string()),
        healthy: bridge.health_check().await,
    };
    output(&result, json_mode);

    if !result.healthy {
        bail!("execution backend health check failed");
    }
    Ok(())
}
