//! Observable occurrences tied to a single task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type-specific payload of a [`StreamEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventKind {
    /// Free-form text produced by the agent
    Output { content: String },
    /// The agent invoked a tool
    #[serde(rename_all = "camelCase")]
    ToolUse {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
    /// The agent modified a file
    #[serde(rename_all = "camelCase")]
    FileEdit {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    /// The agent ran a shell command
    #[serde(rename_all = "camelCase")]
    CommandRun {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
    },
    /// Execution began.
    TaskStarted { description: String },
    /// Execution reached its recorded outcome.
    TaskCompleted { success: bool, output: String },
    /// Something went wrong; `recoverable` tells whether the task goes on.
    Error { message: String, recoverable: bool },
}

impl StreamEventKind {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Output { .. } => "output",
            Self::ToolUse { .. } => "tool_use",
            Self::FileEdit { .. } => "file_edit",
            Self::CommandRun { .. } => "command_run",
            Self::TaskStarted { .. } => "task_started",
            Self::TaskCompleted { .. } => "task_completed",
            Self::Error { .. } => "error",
        }
    }
}

/// A single immutable event emitted for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    /// Task the event belongs to.
    pub task_id: Uuid,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    #[serde(flatten)]
    pub kind: StreamEventKind,
}

impl StreamEvent {
    /// Event stamped with the current time.
    pub fn new(task_id: Uuid, kind: StreamEventKind) -> Self {
        Self {
            task_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    /// `output` event.
    pub fn output(task_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(task_id, StreamEventKind::Output { content: content.into() })
    }

    /// `task_started` event.
    pub fn task_started(task_id: Uuid, description: impl Into<String>) -> Self {
        Self::new(task_id, StreamEventKind::TaskStarted { description: description.into() })
    }

    /// `task_completed` event.
    pub fn task_completed(task_id: Uuid, success: bool, output: impl Into<String>) -> Self {
        Self::new(
            task_id,
            StreamEventKind::TaskCompleted {
                success,
                output: output.into(),
            },
        )
    }

    /// `error` event.
    pub fn error(task_id: Uuid, message: impl Into<String>, recoverable: bool) -> Self {
        Self::new(
            task_id,
            StreamEventKind::Error {
                message: message.into(),
                recoverable,
            },
        )
    }

    /// Wire name of the event type.
    pub fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }
}
