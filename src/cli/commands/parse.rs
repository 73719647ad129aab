//! Implementation of the `cadence parse` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::ParsedCommand;
use crate::services::CommandParser;

/// Arguments of `cadence parse`.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Command text; multiple words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

impl ParseArgs {
    /// The words as one string.
    pub fn text(&self) -> String {
        self.text.join(" ")
    }
}

/// Classification printed by `cadence parse`.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ParseOutput(pub ParsedCommand);

impl CommandOutput for ParseOutput {
    fn to_human(&self) -> String {
        let command = &self.0;
        let mut lines = vec![
            format!("Intent:     {}", command.intent),
            format!("Confidence: {:.2}", command.confidence),
        ];
        if let Some(ref task) = command.task {
            lines.push(format!("Task:       {task}"));
        }
        if let Some(ref repo) = command.repo_url {
            lines.push(format!("Repository: {repo}"));
        }
        lines.join("\n")
    }
}

/// Classify the text and print the result.
pub fn execute(args: &ParseArgs, json_mode: bool) -> Result<()> {
    let parsed = CommandParser::new().parse(&args.text());
    output(&ParseOutput(parsed), json_mode);
    Ok(())
}
