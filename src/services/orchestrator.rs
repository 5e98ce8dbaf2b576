//! Orchestrator Façade (C12): binds every service into the public
//! operations named in `spec.md` §4.11, grounded on the teacher's
//! `services::phase_orchestrator::PhaseOrchestrator` shape (a struct
//! holding `Arc<dyn Trait>` ports plus config, exposing high-level async
//! methods that compose the lower-level services).
//!
//! Per `spec.md` §4.5, `MergeEngine::merge`/`resume` already trigger the
//! Review Chain Engine (on a completed result) or the Conflict Resolver
//! Dispatcher (on a conflict) as an intrinsic part of the merge contract,
//! not as a facade-level add-on. That makes `mergePhaseWithReview` and
//! `mergePhase` observably identical today; both are kept as named
//! operations (matching `spec.md` §4.11's list) rather than collapsed into
//! one, so a future caller that legitimately wants merge-without-review
//! has a seam to hang a flag on.

use std::path::Path;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Phase, ReviewDecision};
use crate::domain::ports::PhaseStore;
use crate::services::merge_engine::{MergeEngine, MergeInput, ResumeInput};
use crate::services::review_chain::{PhaseReviewContext, ReviewChainEngine, ReviewChainOutcome};

/// Binds the orchestration core's services into the public facade
/// operations. Holds no state of its own beyond `Arc`s to its
/// collaborators.
pub struct Orchestrator {
    store: Arc<dyn PhaseStore>,
    merges: Arc<MergeEngine>,
    reviews: Arc<ReviewChainEngine>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<dyn PhaseStore>, merges: Arc<MergeEngine>, reviews: Arc<ReviewChainEngine>) -> Self {
        Self { store, merges, reviews }
    }

    /// `mergePhase(runId, phaseNumber, projectGoal?)`.
    pub async fn merge_phase(
        &self,
        run_id: &str,
        phase_number: u32,
        project_goal: Option<String>,
    ) -> DomainResult<crate::domain::models::PhaseMergeResult> {
        self.merges
            .merge(MergeInput { run_id: run_id.to_string(), phase_number, project_goal })
            .await
    }

    /// `resumeMerge(runId, phaseNumber, mergedSoFar, remainingBranches, projectGoal?)`.
    pub async fn resume_merge(
        &self,
        run_id: &str,
        phase_number: u32,
        merged_so_far: Vec<String>,
        remaining_branches: Vec<String>,
        project_goal: Option<String>,
    ) -> DomainResult<crate::domain::models::PhaseMergeResult> {
        self.merges
            .resume(ResumeInput {
                run_id: run_id.to_string(),
                phase_number,
                merged_so_far,
                remaining_branches,
                project_goal,
            })
            .await
    }

    /// `mergePhaseWithReview`: identical to `mergePhase` today, see module
    /// docs — kept as a distinct named entry point per `spec.md` §4.11.
    pub async fn merge_phase_with_review(
        &self,
        run_id: &str,
        phase_number: u32,
        project_goal: Option<String>,
    ) -> DomainResult<crate::domain::models::PhaseMergeResult> {
        self.merge_phase(run_id, phase_number, project_goal).await
    }

    /// `resumeMergeWithReview`: identical to `resumeMerge` today, see module
    /// docs.
    pub async fn resume_merge_with_review(
        &self,
        run_id: &str,
        phase_number: u32,
        merged_so_far: Vec<String>,
        remaining_branches: Vec<String>,
        project_goal: Option<String>,
    ) -> DomainResult<crate::domain::models::PhaseMergeResult> {
        self.resume_merge(run_id, phase_number, merged_so_far, remaining_branches, project_goal).await
    }

    /// `triggerPhaseReview(runId, phaseNumber)`: manually (re-)start the
    /// review chain for a phase whose merge already produced a phase
    /// branch, without going through `mergePhase` again.
    pub async fn trigger_phase_review(&self, run_id: &str, phase_number: u32) -> DomainResult<ReviewChainOutcome> {
        let phase = self.load_phase(run_id, phase_number).await?;
        let phase_branch = phase
            .phase_branch
            .clone()
            .ok_or_else(|| DomainError::ValidationFailed("phase has no phase branch to review".to_string()))?;

        let ctx = PhaseReviewContext {
            run_id: run_id.to_string(),
            phase_number,
            repo_dir: phase.repo_dir.clone(),
            base_branch: phase.base_branch.clone(),
            phase_branch,
            project_name: phase.project_name.clone(),
        };
        self.reviews.start_chain(ctx).await
    }

    /// Routes a reviewer's decision for `sessionKey` into the review chain.
    /// Not named in `spec.md` §4.11's bare list, but required to drive the
    /// `review decide` CLI subcommand and the HTTP callback it stands in for.
    pub async fn on_review_decision(
        &self,
        session_key: &str,
        decision: ReviewDecision,
    ) -> DomainResult<ReviewChainOutcome> {
        self.reviews.on_decision(session_key, decision).await
    }

    /// `detectPotentialConflicts(repoDir, branches, baseBranch)`.
    pub async fn detect_potential_conflicts(
        &self,
        repo_dir: &Path,
        branches: &[String],
        base_branch: &str,
    ) -> DomainResult<Vec<String>> {
        self.merges.potential_conflicts(repo_dir, branches, base_branch).await
    }

    /// `getPhaseMergeStats(runId, phaseNumber)`.
    pub async fn get_phase_merge_stats(
        &self,
        run_id: &str,
        phase_number: u32,
    ) -> DomainResult<crate::domain::models::MergeStats> {
        let phase = self.load_phase(run_id, phase_number).await?;
        Ok(MergeEngine::merge_stats(&phase))
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
    use crate::adapters::ledger::{FileEscalationStore, FileEventLedger};
    use crate::domain::models::{RoleRegistry, Worker};
    use crate::domain::ports::vcs::{MergeOptions, MergeOutcome, MergeReport, VcsAdapter};
    use crate::domain::ports::gateway::{GatewayClient, SessionSummary, SpawnOutcome, SpawnParams};
    use crate::services::agent_dispatch::{AgentDispatcher, DispatchConfig};
    use crate::services::conflict_resolver::ConflictResolverDispatcher;
    use crate::services::phase_collector::PhaseCollector;
    use crate::services::phase_store::FilePhaseStore;
    use crate::services::worker_tracker::WorkerTracker;
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeVcs;

    #[async_trait]
    impl VcsAdapter for FakeVcs {
        async fn worktree_add(&self, _r: &Path, _p: &Path, _b: &str, _f: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn worktree_remove(&self, _r: &Path, _p: &Path, _force: bool) -> DomainResult<()> {
            Ok(())
        }
        async fn worktree_prune(&self, _r: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_create(&self, _r: &Path, _b: &str, _f: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_delete(&self, _r: &Path, _b: &str, _force: bool) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_exists(&self, _r: &Path, _b: &str) -> DomainResult<bool> {
            Ok(false)
        }
        async fn current_branch(&self, _r: &Path) -> DomainResult<String> {
            Ok("main".to_string())
        }
        async fn checkout(&self, _r: &Path, _b: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn merge(&self, _r: &Path, _s: &str, _o: MergeOptions) -> DomainResult<MergeReport> {
            Ok(MergeReport { outcome: MergeOutcome::Success, detail: String::new() })
        }
        async fn merge_abort(&self, _r: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn conflicted_files(&self, _r: &Path) -> DomainResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn stage(&self, _r: &Path, _p: &[String]) -> DomainResult<()> {
            Ok(())
        }
        async fn stage_all(&self, _r: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn commit(&self, _r: &Path, _m: &str) -> DomainResult<Option<String>> {
            Ok(None)
        }
        async fn diff_names(&self, _r: &Path, _b: &str, _f: &str) -> DomainResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn file_at_ref(&self, _r: &Path, _p: &str, _f: &str) -> DomainResult<Option<String>> {
            Ok(None)
        }
        async fn fetch(&self, _r: &Path, _remote: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn push(&self, _r: &Path, _remote: &str, _b: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn merge_base(&self, _r: &Path, _a: &str, _b: &str) -> DomainResult<String> {
            Ok("deadbeef".to_string())
        }
    }

    struct FakeGateway;

    #[async_trait]
    impl GatewayClient for FakeGateway {
        async fn sessions_spawn(&self, _params: &SpawnParams) -> DomainResult<SpawnOutcome> {
            unreachable!("not exercised by these facade tests")
        }
        async fn sessions_list(&self, _limit: u32, _message_limit: u32) -> DomainResult<Vec<SessionSummary>> {
            Ok(Vec::new())
        }
    }

    fn build_orchestrator(dir: &std::path::Path) -> Orchestrator {
        let store: Arc<dyn PhaseStore> = Arc::new(FilePhaseStore::new(dir.to_path_buf()));
        let vcs: Arc<dyn VcsAdapter> = Arc::new(FakeVcs);
        let ledger = Arc::new(FileEventLedger::new(dir.to_path_buf()));
        let escalations = Arc::new(FileEscalationStore::new(dir.to_path_buf()));
        let gateway: Arc<dyn GatewayClient> = Arc::new(FakeGateway);
        let tracker = Arc::new(WorkerTracker::new(gateway.clone(), ledger.clone()));
        let dispatcher = Arc::new(AgentDispatcher::new(gateway, ledger.clone(), tracker, DispatchConfig::default()));
        let collector = Arc::new(PhaseCollector::new(store.clone(), vcs.clone(), ledger.clone()));
        let resolver = Arc::new(ConflictResolverDispatcher::new(vcs.clone(), dispatcher.clone(), ledger));
        let reviews = Arc::new(ReviewChainEngine::new(vcs.clone(), dispatcher, RoleRegistry::default(), escalations));
        let merges = Arc::new(MergeEngine::new(store.clone(), collector, vcs, resolver, reviews.clone()));
        Orchestrator::new(store, merges, reviews)
    }

    #[tokio::test]
    async fn get_phase_merge_stats_reports_risk_from_collected_branches() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path());

        let mut phase = Phase::new("run-1", 1, "/repo", "main", vec![Worker::new("w1", "t1"), Worker::new("w2", "t2")]);
        phase.collected_branches = Some(vec!["b1".to_string()]);
        orchestrator.store.save(&phase).await.unwrap();

        let stats = orchestrator.get_phase_merge_stats("run-1", 1).await.unwrap();
        assert_eq!(stats.total_branches, 2);
        assert_eq!(stats.branches_with_changes, 1);
    }

    #[tokio::test]
    async fn trigger_phase_review_without_a_phase_branch_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path());

        let phase = Phase::new("run-1", 1, "/repo", "main", vec![]);
        orchestrator.store.save(&phase).await.unwrap();

        let err = orchestrator.trigger_phase_review("run-1", 1).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn detect_potential_conflicts_with_no_branches_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(dir.path());
        let conflicts = orchestrator.detect_potential_conflicts(Path::new("/repo"), &[], "main").await.unwrap();
        assert!(conflicts.is_empty());
    }
}
