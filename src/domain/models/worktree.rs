//! Worktree domain model and naming convention.
//!
//! A worktree is an independent checkout of the run's repository, sharing
//! the object database but with its own working directory and current
//! branch, exclusively owned by one worker for the worker's lifetime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix shared by every branch swarmops creates.
pub const BRANCH_PREFIX: &str = "swarmops";

/// A worker's isolated git worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worktree {
    pub run_id: String,
    pub worker_id: String,
    pub path: PathBuf,
    pub branch: String,
    pub base_branch: String,
    pub repo_dir: PathBuf,
}

impl Worktree {
    /// Deterministic worker branch name: `swarmops/<runId>/worker-<workerId>`.
    #[must_use]
    pub fn worker_branch(run_id: &str, worker_id: &str) -> String {
        format!("{BRANCH_PREFIX}/{run_id}/worker-{worker_id}")
    }

    /// Deterministic phase branch name: `swarmops/<runId>/phase-<phaseNumber>`.
    #[must_use]
    pub fn phase_branch(run_id: &str, phase_number: u32) -> String {
        format!("{BRANCH_PREFIX}/{run_id}/phase-{phase_number}")
    }

    /// Deterministic worktree path: `<worktreeRoot>/<runId>/<workerId>`.
    #[must_use]
    pub fn worker_path(worktree_root: &std::path::Path, run_id: &str, worker_id: &str) -> PathBuf {
        worktree_root.join(run_id).join(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_branch_naming_convention() {
        assert_eq!(
            Worktree::worker_branch("run-1", "w-2"),
            "swarmops/run-1/worker-w-2"
        );
    }

    #[test]
    fn phase_branch_naming_convention() {
        assert_eq!(Worktree::phase_branch("run-1", 3), "swarmops/run-1/phase-3");
    }

    #[test]
    fn worker_path_naming_convention() {
        let root = std::path::Path::new("/worktrees");
        assert_eq!(
            Worktree::worker_path(root, "run-1", "w-2"),
            PathBuf::from("/worktrees/run-1/w-2")
        );
    }
}
