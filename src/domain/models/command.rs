//! Parsed voice/text commands.

use serde::{Deserialize, Serialize};

/// Classified purpose of a natural-language command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Start a new task.
    CreateTask,
    /// Ask about a task's progress.
    CheckStatus,
    /// Stop the current task.
    CancelTask,
    /// Enumerate tasks.
    ListTasks,
    /// Nothing matched.
    Unknown,
}

impl Intent {
    /// Wire name of the intent.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::CheckStatus => "check_status",
            Self::CancelTask => "cancel_task",
            Self::ListTasks => "list_tasks",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of intent classification. Produced fresh for every input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCommand {
    /// Classified intent.
    pub intent: Intent,
    /// Extracted task description (only for `create_task`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    /// GitHub repository mentioned in the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Heuristic match strength in [0, 1]; not a probability
    pub confidence: f64,
}

impl ParsedCommand {
    /// An unrecognized command with the given confidence.
    pub fn unknown(confidence: f64) -> Self {
        Self {
            intent: Intent::Unknown,
            task: None,
            repo_url: None,
            confidence,
        }
    }
}
