//! Worker domain model.
//!
//! A worker is one agent instance executing one task on its own branch in
//! its own worktree. Status transitions are monotone:
//! `pending -> running -> (completed | failed)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a worker within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkerStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

/// One agent instance executing one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub task_id: String,
    pub status: WorkerStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Worker {
    #[must_use]
    pub fn new(worker_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            task_id: task_id.into(),
            status: WorkerStatus::Pending,
            output: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = WorkerStatus::Running;
    }

    /// Transition to a terminal status. A no-op if already terminal, so
    /// repeated completion events for the same worker are idempotent.
    pub fn complete(&mut self, status: WorkerStatus, output: Option<String>, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.output = output;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_completion_is_a_no_op() {
        let mut w = Worker::new("w1", "t1");
        w.start();
        w.complete(WorkerStatus::Completed, Some("ok".into()), None);
        w.complete(WorkerStatus::Failed, None, Some("late failure".into()));
        assert_eq!(w.status, WorkerStatus::Completed);
        assert_eq!(w.output.as_deref(), Some("ok"));
    }
}
