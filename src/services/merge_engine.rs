//! Sequential Merge Engine (C6): merges a list of worker branches into a
//! phase branch one at a time, detecting conflicts and supporting
//! resumption, per `spec.md` §4.5.
//!
//! Grounded on the teacher's `services::merge_queue` two-stage merge
//! (`check_merge_conflicts`/`git_merge`, conflict-vs-fatal branching),
//! generalized from two fixed stages to an arbitrary ordered branch list.
//! Single-threaded per `(run_id, phase_number)` via a per-key lock, matching
//! `spec.md` §5 ("only one merge may be in flight per (runId, phaseNumber)").

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ConflictInfo, ConflictRisk, MergeStats, Phase, PhaseMergeResult,
};
use crate::domain::ports::vcs::{MergeOptions, MergeOutcome, VcsAdapter};
use crate::domain::ports::PhaseStore;
use crate::services::conflict_resolver::{ConflictResolverDispatcher, ResolveConflict};
use crate::services::phase_collector::PhaseCollector;
use crate::services::review_chain::{PhaseReviewContext, ReviewChainEngine, ReviewChainOutcome};

/// Parameters for [`MergeEngine::merge`].
pub struct MergeInput {
    pub run_id: String,
    pub phase_number: u32,
    pub project_goal: Option<String>,
}

/// Parameters for [`MergeEngine::resume`].
pub struct ResumeInput {
    pub run_id: String,
    pub phase_number: u32,
    pub merged_so_far: Vec<String>,
    pub remaining_branches: Vec<String>,
    pub project_goal: Option<String>,
}

/// Merges worker branches into a phase branch, one at a time.
pub struct MergeEngine {
    store: Arc<dyn PhaseStore>,
    collector: Arc<PhaseCollector>,
    vcs: Arc<dyn VcsAdapter>,
    resolver: Arc<ConflictResolverDispatcher>,
    reviews: Arc<ReviewChainEngine>,
    locks: RwLock<HashMap<(String, u32), Arc<Mutex<()>>>>,
}

impl MergeEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn PhaseStore>,
        collector: Arc<PhaseCollector>,
        vcs: Arc<dyn VcsAdapter>,
        resolver: Arc<ConflictResolverDispatcher>,
        reviews: Arc<ReviewChainEngine>,
    ) -> Self {
        Self { store, collector, vcs, resolver, reviews, locks: RwLock::new(HashMap::new()) }
    }

    async fn lock_for(&self, run_id: &str, phase_number: u32) -> Arc<Mutex<()>> {
        let key = (run_id.to_string(), phase_number);
        if let Some(lock) = self.locks.read().await.get(&key) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// `merge(phaseInput)`, steps 1-5 of `spec.md` §4.5.
    pub async fn merge(&self, input: MergeInput) -> DomainResult<PhaseMergeResult> {
        let lock = self.lock_for(&input.run_id, input.phase_number).await;
        let _guard = lock.lock().await;

        let phase = self.load_phase(&input.run_id, input.phase_number).await?;
        if phase.any_failed() || phase.any_running() {
            return Ok(PhaseMergeResult::failed(
                "phase has failed or still-running workers",
                Vec::new(),
            ));
        }

        let branches = match self.collector.collect_phase_branches(&input.run_id, input.phase_number).await {
            Ok(branches) => branches,
            Err(err) => return Ok(PhaseMergeResult::failed(err.to_string(), Vec::new())),
        };
        if branches.is_empty() {
            self.collector.complete_phase(&input.run_id, input.phase_number).await?;
            return Ok(PhaseMergeResult::no_changes());
        }

        let phase = self.load_phase(&input.run_id, input.phase_number).await?;
        let phase_branch = phase
            .phase_branch
            .clone()
            .ok_or_else(|| DomainError::ValidationFailed("collected branches but no phase branch recorded".to_string()))?;

        let repo_dir = Path::new(&phase.repo_dir);
        let original_branch = self.vcs.current_branch(repo_dir).await.ok();
        if let Err(err) = self.vcs.checkout(repo_dir, &phase_branch).await {
            return Ok(PhaseMergeResult::failed(err.to_string(), Vec::new()));
        }

        let result = self
            .merge_sequential(&phase, &phase_branch, Vec::new(), branches, original_branch.as_deref())
            .await?;
        self.finish(&input.run_id, input.phase_number, input.project_goal.as_deref(), result).await
    }

    /// `resume(phaseInput, remainingBranches)`: continues step 4 on the
    /// already-existing phase branch. An empty `remaining_branches` means
    /// the resume is trivially complete.
    pub async fn resume(&self, input: ResumeInput) -> DomainResult<PhaseMergeResult> {
        let lock = self.lock_for(&input.run_id, input.phase_number).await;
        let _guard = lock.lock().await;

        let phase = self.load_phase(&input.run_id, input.phase_number).await?;
        let phase_branch = phase
            .phase_branch
            .clone()
            .ok_or_else(|| DomainError::ValidationFailed("resume requires an existing phase branch".to_string()))?;

        if input.remaining_branches.is_empty() {
            self.collector.complete_phase(&input.run_id, input.phase_number).await?;
            let completed = PhaseMergeResult::completed(phase_branch, input.merged_so_far);
            return self.finish(&input.run_id, input.phase_number, input.project_goal.as_deref(), completed).await;
        }

        let repo_dir = Path::new(&phase.repo_dir);
        let original_branch = self.vcs.current_branch(repo_dir).await.ok();
        if let Err(err) = self.vcs.checkout(repo_dir, &phase_branch).await {
            return Ok(PhaseMergeResult::failed(err.to_string(), input.merged_so_far));
        }

        let result = self
            .merge_sequential(&phase, &phase_branch, input.merged_so_far, input.remaining_branches, original_branch.as_deref())
            .await?;
        self.finish(&input.run_id, input.phase_number, input.project_goal.as_deref(), result).await
    }

    async fn merge_sequential(
        &self,
        phase: &Phase,
        phase_branch: &str,
        mut merged: Vec<String>,
        branches: Vec<String>,
        original_branch: Option<&str>,
    ) -> DomainResult<PhaseMergeResult> {
        let repo_dir = Path::new(&phase.repo_dir);

        for (i, branch) in branches.iter().enumerate() {
            if !self.vcs.branch_exists(repo_dir, branch).await? {
                continue;
            }

            let report = self
                .vcs
                .merge(repo_dir, branch, MergeOptions { message: Some(format!("Merge worker branch {branch}")), no_commit: false })
                .await?;

            match report.outcome {
                MergeOutcome::Success => merged.push(branch.clone()),
                MergeOutcome::Conflict => {
                    let conflict_files = self.vcs.conflicted_files(repo_dir).await?;
                    let merge_base = self.vcs.merge_base(repo_dir, &phase.base_branch, branch).await.unwrap_or_default();
                    let remaining_branches = branches[i + 1..].to_vec();
                    let info = ConflictInfo {
                        failed_branch: branch.clone(),
                        conflict_files,
                        phase_branch: phase_branch.to_string(),
                        remaining_branches,
                        merge_base,
                    };
                    return Ok(PhaseMergeResult::conflict(info, merged));
                }
                MergeOutcome::Fatal => {
                    self.vcs.merge_abort(repo_dir).await.ok();
                    if let Some(original) = original_branch {
                        self.vcs.checkout(repo_dir, original).await.ok();
                    }
                    return Ok(PhaseMergeResult::failed(report.detail, merged));
                }
            }
        }

        Ok(PhaseMergeResult::completed(phase_branch.to_string(), merged))
    }

    /// On a completed/no-changes result, kick off the review chain; on a
    /// conflict, dispatch the conflict resolver. Dispatch failures are
    /// logged (via the dispatcher/ledger) but never change the merge
    /// status itself, per `spec.md` §4.5.
    async fn finish(
        &self,
        run_id: &str,
        phase_number: u32,
        project_goal: Option<&str>,
        mut result: PhaseMergeResult,
    ) -> DomainResult<PhaseMergeResult> {
        use crate::domain::models::MergeStatus;

        match result.status {
            MergeStatus::Completed => {
                self.collector.complete_phase(run_id, phase_number).await?;
                let phase = self.load_phase(run_id, phase_number).await?;
                if let Some(phase_branch) = result.phase_branch.clone() {
                    let ctx = PhaseReviewContext {
                        run_id: run_id.to_string(),
                        phase_number,
                        repo_dir: phase.repo_dir.clone(),
                        base_branch: phase.base_branch.clone(),
                        phase_branch,
                        project_name: phase.project_name.clone(),
                    };
                    match self.reviews.start_chain(ctx).await {
                        Ok(ReviewChainOutcome::NextReviewer { session_key, .. }) => {
                            result.reviewer_session = Some(session_key);
                        }
                        Ok(_) | Err(_) => {}
                    }
                }
            }
            MergeStatus::Conflict => {
                if let Some(info) = result.conflict_info.clone() {
                    let phase = self.load_phase(run_id, phase_number).await?;
                    // Best-effort descriptions keyed by branch: the engine has no
                    // TaskGraph access of its own, so it falls back to the worker's
                    // task id rather than a human-readable title.
                    let merged_task_descriptions: HashMap<String, String> =
                        PhaseCollector::worker_task_contexts(&phase, &result.merged_branches, run_id)
                            .into_iter()
                            .map(|(branch, worker)| (branch, worker.task_id.clone()))
                            .collect();
                    let resolve = ResolveConflict {
                        run_id: run_id.to_string(),
                        phase_number,
                        repo_path: std::path::PathBuf::from(&phase.repo_dir),
                        source_branch: info.failed_branch.clone(),
                        target_branch: info.phase_branch.clone(),
                        conflict_files: info.conflict_files.clone(),
                        project_goal: project_goal.map(str::to_string),
                        source_task: format!("resolve conflicts on {}", info.failed_branch),
                        merged_task_descriptions,
                    };
                    if let Ok(outcome) = self.resolver.resolve(resolve).await {
                        result.resolver_session = outcome.session_key;
                    }
                }
            }
            MergeStatus::Failed | MergeStatus::NoChanges => {}
        }

        Ok(result)
    }

    /// `potentialConflicts`: a pre-merge advisory query, not a correctness
    /// gate. Returns files touched by more than one branch's diff against
    /// `base_branch`.
    pub async fn potential_conflicts(
        &self,
        repo_dir: &Path,
        branches: &[String],
        base_branch: &str,
    ) -> DomainResult<Vec<String>> {
        let mut touch_counts: HashMap<String, usize> = HashMap::new();
        for branch in branches {
            let changed = self.vcs.diff_names(repo_dir, base_branch, branch).await?;
            let unique: HashSet<String> = changed.into_iter().collect();
            for file in unique {
                *touch_counts.entry(file).or_insert(0) += 1;
            }
        }
        let mut shared: Vec<String> = touch_counts.into_iter().filter(|(_, n)| *n > 1).map(|(f, _)| f).collect();
        shared.sort();
        Ok(shared)
    }

    /// `mergeStats(phase)`.
    #[must_use]
    pub fn merge_stats(phase: &Phase) -> MergeStats {
        let total_branches = phase.workers.len();
        let branches_with_changes = phase.collected_branches.as_ref().map_or(0, Vec::len);
        MergeStats {
            total_branches,
            branches_with_changes,
            estimated_conflict_risk: ConflictRisk::from_branch_count(branches_with_changes),
        }
    }

    async fn load_phase(&self, run_id: &str, phase_number: u32) -> DomainResult<Phase> {
        self.store
            .load(run_id, phase_number)
            .await?
            .ok_or_else(|| DomainError::PhaseNotFound { run_id: run_id.to_string(), phase_number })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_coherence_property_holds_by_construction() {
        // B = M + [f] + R is guaranteed by merge_sequential's construction:
        // `merged` accumulates successes in order, `branch` is the failing
        // element, and `remaining_branches` is the tail after it.
        let branches = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let failing_index = 2;
        let merged = branches[..failing_index].to_vec();
        let failed = branches[failing_index].clone();
        let remaining = branches[failing_index + 1..].to_vec();

        let mut reconstructed = merged.clone();
        reconstructed.push(failed);
        reconstructed.extend(remaining);
        assert_eq!(reconstructed, branches);
    }
}
