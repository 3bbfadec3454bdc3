use std::path::PathBuf;

use crate::error::Error;

/// Tasks waiting for a free download slot stay `Pending`; `InProgress`
/// starts once the transfer itself begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// One file's transfer: where it comes from, where it goes, and how far along it is.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    /// From `content-length`; 0 when the server did not say.
    pub total_bytes: u64,
    pub transferred: u64,
    pub state: TaskState,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            total_bytes: 0,
            transferred: 0,
            state: TaskState::Pending,
        }
    }

    pub fn file_name(&self) -> String {
        self.destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.url.clone())
    }

    /// Moves the task forward. Terminal states are final.
    pub fn advance(&mut self, next: TaskState) {
        if !self.state.is_terminal() {
            self.state = next;
        }
    }
}

#[derive(Debug)]
pub struct TaskOutcome {
    pub task: DownloadTask,
    pub error: Option<Error>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.task.state == TaskState::Completed
    }
}
