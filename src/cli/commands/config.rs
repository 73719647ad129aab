//! Implementation of the `cadence config` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

const REDACTED: &str = "********";

/// Effective configuration with the backend credential masked.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput(pub Config);

impl ConfigOutput {
    /// Wrap `config`, masking the API key.
    pub fn redacted(mut config: Config) -> Self {
        if config.execution.api_key.is_some() {
            config.execution.api_key = Some(REDACTED.to_string());
        }
        Self(config)
    }
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.0).unwrap_or_default()
    }
}

/// Print the effective configuration.
pub fn execute(config: Config, json_mode: bool) -> Result<()> {
    output(&ConfigOutput::redacted(config), json_mode);
    Ok(())
}
