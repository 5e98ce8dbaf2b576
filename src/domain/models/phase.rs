//! Phase domain model: one layer of parallel work within a run.

use super::worker::{Worker, WorkerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Running,
    Completed,
    Failed,
}

/// One layer of parallel work, identified by `(run_id, phase_number)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub run_id: String,
    pub phase_number: u32,
    pub repo_dir: String,
    pub base_branch: String,
    pub phase_branch: Option<String>,
    pub project_path: Option<String>,
    pub project_name: Option<String>,
    pub workers: Vec<Worker>,
    pub status: PhaseStatus,
    pub collected_branches: Option<Vec<String>>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Phase {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        phase_number: u32,
        repo_dir: impl Into<String>,
        base_branch: impl Into<String>,
        workers: Vec<Worker>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            phase_number,
            repo_dir: repo_dir.into(),
            base_branch: base_branch.into(),
            phase_branch: None,
            project_path: None,
            project_name: None,
            workers,
            status: PhaseStatus::Running,
            collected_branches: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[must_use]
    pub fn all_terminal(&self) -> bool {
        self.workers.iter().all(|w| w.status.is_terminal())
    }

    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.workers.iter().any(|w| w.status == WorkerStatus::Failed)
    }

    #[must_use]
    pub fn any_running(&self) -> bool {
        self.workers.iter().any(|w| w.status == WorkerStatus::Running || w.status == WorkerStatus::Pending)
    }

    pub fn worker_mut(&mut self, worker_id: &str) -> Option<&mut Worker> {
        self.workers.iter_mut().find(|w| w.worker_id == worker_id)
    }
}

/// Status of one sequential-merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStatus {
    Completed,
    Conflict,
    Failed,
    NoChanges,
}

/// Exactly the resume point after a conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub failed_branch: String,
    pub conflict_files: Vec<String>,
    pub phase_branch: String,
    pub remaining_branches: Vec<String>,
    pub merge_base: String,
}

/// Returned by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseMergeResult {
    pub success: bool,
    pub status: MergeStatus,
    pub phase_branch: Option<String>,
    pub merged_branches: Vec<String>,
    pub conflict_info: Option<ConflictInfo>,
    pub resolver_session: Option<String>,
    pub reviewer_session: Option<String>,
    pub error: Option<String>,
}

impl PhaseMergeResult {
    #[must_use]
    pub fn completed(phase_branch: String, merged_branches: Vec<String>) -> Self {
        Self {
            success: true,
            status: MergeStatus::Completed,
            phase_branch: Some(phase_branch),
            merged_branches,
            conflict_info: None,
            resolver_session: None,
            reviewer_session: None,
            error: None,
        }
    }

    #[must_use]
    pub fn no_changes() -> Self {
        Self {
            success: true,
            status: MergeStatus::NoChanges,
            phase_branch: None,
            merged_branches: Vec::new(),
            conflict_info: None,
            resolver_session: None,
            reviewer_session: None,
            error: None,
        }
    }

    #[must_use]
    pub fn conflict(info: ConflictInfo, merged_branches: Vec<String>) -> Self {
        Self {
            success: false,
            status: MergeStatus::Conflict,
            phase_branch: Some(info.phase_branch.clone()),
            merged_branches,
            conflict_info: Some(info),
            resolver_session: None,
            reviewer_session: None,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>, merged_branches: Vec<String>) -> Self {
        Self {
            success: false,
            status: MergeStatus::Failed,
            phase_branch: None,
            merged_branches,
            conflict_info: None,
            resolver_session: None,
            reviewer_session: None,
            error: Some(error.into()),
        }
    }
}

/// Estimated conflict risk for [`MergeStats`], as a function of how many
/// worker branches actually carry changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRisk {
    Low,
    Medium,
    High,
}

impl ConflictRisk {
    #[must_use]
    pub fn from_branch_count(branches_with_changes: usize) -> Self {
        if branches_with_changes <= 2 {
            Self::Low
        } else if branches_with_changes <= 5 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// A pre-merge advisory summary of a phase's mergeability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStats {
    pub total_branches: usize,
    pub branches_with_changes: usize,
    pub estimated_conflict_risk: ConflictRisk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_risk_thresholds() {
        assert_eq!(ConflictRisk::from_branch_count(0), ConflictRisk::Low);
        assert_eq!(ConflictRisk::from_branch_count(2), ConflictRisk::Low);
        assert_eq!(ConflictRisk::from_branch_count(3), ConflictRisk::Medium);
        assert_eq!(ConflictRisk::from_branch_count(5), ConflictRisk::Medium);
        assert_eq!(ConflictRisk::from_branch_count(6), ConflictRisk::High);
    }
}
