//! Execution request/response types exchanged with the execution backend.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;

/// Body sent to the execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Local correlation id; not part of the wire body
    #[serde(skip)]
    pub task_id: Uuid,
    /// Task description
    pub task: String,
    /// Repository to work in, when given as a URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Local checkout to work in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,
}

impl From<&Task> for ExecutionRequest {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            task: task.description.clone(),
            repo_url: task.repo_url.clone(),
            repo_path: task.repo_path.clone(),
        }
    }
}

/// Pull request reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    /// Pull request page.
    pub url: String,
    /// Positive pull request number.
    pub number: u64,
    /// Head branch.
    pub branch: String,
}

/// Outcome of an execution. Failures are reported as data (`success == false`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Whether the backend finished the task.
    pub success: bool,
    /// Final output, or the failure message.
    #[serde(default)]
    pub output: String,
    /// Pull request opened by the execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    /// Number of that pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    /// Branch of that pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_branch: Option<String>,
}

impl ExecutionResult {
    /// Successful result without a pull request.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            pr_url: None,
            pr_number: None,
            pr_branch: None,
        }
    }

    /// Failed result carrying `output` as the error.
    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(output)
        }
    }

    /// Attach a pull request to the result.
    pub fn with_pull_request(mut self, url: impl Into<String>, number: u64, branch: impl Into<String>) -> Self {
        self.pr_url = Some(url.into());
        self.pr_number = Some(number);
        self.pr_branch = Some(branch.into());
        self
    }

    /// The pull request, when the backend reported all of its fields.
    pub fn pull_request(&self) -> Option<PullRequestRef> {
        match (&self.pr_url, self.pr_number, &self.pr_branch) {
            (Some(url), Some(number), Some(branch)) if number > 0 => Some(PullRequestRef {
                url: url.clone(),
                number,
                branch: branch.clone(),
            }),
            _ => None,
        }
    }
}
