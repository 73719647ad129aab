//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::commands::{parse::ParseArgs, serve::ServeArgs};

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence - voice-driven coding agent controller", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of .cadence/
    #[arg(short, long, global = true, env = "CADENCE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP/WebSocket server
    Serve(ServeArgs),

    /// Classify a command without executing it
    Parse(ParseArgs),

    /// Check the execution backend
    Health,

    /// Print the effective configuration
    Config,
}
