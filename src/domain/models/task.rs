//! Task domain model.
//!
//! A task is one unit of dispatched remote-execution work. Its lifecycle is
//! `pending -> running -> (pr_open ->) completed | failed | cancelled`, with
//! `cancelled` reachable from every non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is recorded but execution has not started
    #[default]
    Pending,
    /// Task is being executed by the backend
    Running,
    /// Execution produced a pull request that awaits review
    PrOpen,
    /// Task completed successfully
    Completed,
    /// Task failed during execution
    Failed,
    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::PrOpen => "pr_open",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a status name, case-insensitively. Accepts `complete` and `canceled`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "pr_open" => Some(Self::PrOpen),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if this is an active (non-terminal) state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Pending => vec![Self::Running, Self::Completed, Self::Failed, Self::Cancelled],
            Self::Running => vec![Self::PrOpen, Self::Completed, Self::Failed, Self::Cancelled],
            Self::PrOpen => vec![Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => vec![],
        }
    }

    /// Whether the state machine allows moving to `new_status`.
    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the pull request attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    /// Awaiting review.
    Open,
    /// Merged into the target branch.
    Merged,
    /// Closed without merging.
    Closed,
}

impl PrState {
    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::Closed => "closed",
        }
    }

    /// Parse a state name, case-insensitively.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "merged" => Some(Self::Merged),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// A discrete unit of work dispatched to the execution backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// What the agent should do
    pub description: String,
    /// Remote repository hint
    pub repo_url: Option<String>,
    /// Local checkout hint
    pub repo_path: Option<String>,
    /// Current status
    pub status: TaskStatus,
    /// Execution output (set on success, and on PR creation)
    pub output: Option<String>,
    /// Failure detail (set on failure)
    pub error: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last change
    pub updated_at: DateTime<Utc>,
    /// Set iff the status is terminal
    pub completed_at: Option<DateTime<Utc>>,
    /// Pull request page, once one is opened
    pub pr_url: Option<String>,
    /// Positive pull request number
    pub pr_number: Option<u64>,
    /// Pull request head branch
    pub pr_branch: Option<String>,
    /// Review state of the pull request
    pub pr_state: Option<PrState>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            repo_url: None,
            repo_path: None,
            status: TaskStatus::default(),
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            pr_url: None,
            pr_number: None,
            pr_branch: None,
            pr_state: None,
        }
    }

    /// Set the repository URL hint.
    pub fn with_repo_url(mut self, repo_url: impl Into<String>) -> Self {
        self.repo_url = Some(repo_url.into());
        self
    }

    /// Set the repository path hint.
    pub fn with_repo_path(mut self, repo_path: impl Into<String>) -> Self {
        self.repo_path = Some(repo_path.into());
        self
    }

    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to new status, maintaining the `completed_at` invariant.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }

        let now = Utc::now();
        self.status = new_status;
        self.updated_at = now;
        if new_status.is_terminal() {
            self.completed_at = Some(now);
        }

        Ok(())
    }

    /// Attach a pull request, moving the task to `pr_open`.
    pub fn open_pr(
        &mut self,
        pr_url: impl Into<String>,
        pr_number: u64,
        pr_branch: impl Into<String>,
    ) -> Result<(), String> {
        if pr_number == 0 {
            return Err("PR number must be positive".to_string());
        }
        if self.status != TaskStatus::PrOpen {
            self.transition_to(TaskStatus::PrOpen)?;
        }
        self.pr_url = Some(pr_url.into());
        self.pr_number = Some(pr_number);
        self.pr_branch = Some(pr_branch.into());
        self.pr_state = Some(PrState::Open);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Whether a pull request has been recorded for this task.
    pub fn has_pr(&self) -> bool {
        self.pr_number.is_some()
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate task.
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if self.completed_at.is_some() != self.status.is_terminal() {
            return Err("completed_at must be set exactly when the task is terminal".to_string());
        }
        Ok(())
    }
}
