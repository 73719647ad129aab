//! Command-line interface for the `cadence` binary.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use anyhow::Result;
use std::path::Path;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Load the effective configuration, from `path` when given.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Print `err` and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
