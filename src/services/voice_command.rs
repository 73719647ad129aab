//! Turns a parsed voice command into an action on the task pipeline.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::command_parser::CommandParser;
use super::task_dispatcher::TaskDispatcher;
use crate::domain::errors::DomainResult;
use crate::domain::models::{Intent, ParsedCommand, Task};

/// What a voice command did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VoiceCommandOutcome {
    /// A task was submitted.
    TaskCreated { task: Task },
    /// Current tasks, newest first.
    TaskList { tasks: Vec<Task> },
    /// The task asked about, or the latest one.
    TaskStatus { task: Option<Task> },
    /// A task was cancelled.
    TaskCancelled { task: Task },
    /// Recognized, but nothing to act on.
    NoAction { message: String },
    /// The text did not match any command.
    Unrecognized { message: String },
}

/// Parsed command together with what was done about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceCommandResponse {
    /// How the text was understood.
    pub command: ParsedCommand,
    /// What happened.
    #[serde(flatten)]
    pub outcome: VoiceCommandOutcome,
}

/// Executes spoken commands against the dispatcher.
pub struct VoiceCommandService {
    parser: CommandParser,
    dispatcher: Arc<TaskDispatcher>,
}

impl VoiceCommandService {
    /// Service submitting work through `dispatcher`.
    pub fn new(dispatcher: Arc<TaskDispatcher>) -> Self {
        Self {
            parser: CommandParser::new(),
            dispatcher,
        }
    }

    /// Classify text without acting on it.
    pub fn parse(&self, text: &str) -> ParsedCommand {
        self.parser.parse(text)
    }

    /// Classify text and carry out the command.
    pub async fn handle(&self, text: &str) -> DomainResult<VoiceCommandResponse> {
        let command = self.parser.parse(text);
        info!(intent = %command.intent, confidence = command.confidence, "voice command");

        let store = self.dispatcher.store();
        let outcome = match command.intent {
            Intent::CreateTask => match command.task.as_deref() {
                Some(description) => {
                    let task = self
                        .dispatcher
                        .submit(description, command.repo_url.clone(), None)
                        .await?;
                    VoiceCommandOutcome::TaskCreated { task }
                }
                None => VoiceCommandOutcome::Unrecognized {
                    message: "Could not tell what the task should be".to_string(),
                },
            },
            Intent::ListTasks => VoiceCommandOutcome::TaskList {
                tasks: store.list().await?,
            },
            Intent::CheckStatus => VoiceCommandOutcome::TaskStatus {
                task: store.latest(false).await?,
            },
            Intent::CancelTask => match store.latest(true).await? {
                Some(task) => VoiceCommandOutcome::TaskCancelled {
                    task: self.dispatcher.cancel(task.id).await?,
                },
                None => VoiceCommandOutcome::NoAction {
                    message: "There is no active task to cancel".to_string(),
                },
            },
            Intent::Unknown => VoiceCommandOutcome::Unrecognized {
                message: "Sorry, I did not understand that command".to_string(),
            },
        };

        Ok(VoiceCommandResponse { command, outcome })
    }
}
