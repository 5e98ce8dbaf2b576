//! Phase Collector (C5): initializes phases, receives worker completion
//! events, determines merge-readiness, and collects the worker branch set.
//!
//! Mutations are single-writer per `(run_id, phase_number)`, guarded by a
//! per-key lock kept in a process-wide map, grounded on the teacher's
//! `Arc<RwLock<HashMap<Scope, _>>>` singleton-state pattern in
//! `circuit_breaker.rs`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ledger::entry_type;
use crate::domain::models::{LedgerEntry, Phase, PhaseStatus, Task, Worker, WorkerStatus, Worktree};
use crate::domain::ports::vcs::VcsAdapter;
use crate::domain::ports::{EventLedger, PhaseStore};

/// Parameters for [`PhaseCollector::init_phase`].
pub struct InitPhase {
    pub run_id: String,
    pub phase_number: u32,
    pub repo_dir: String,
    pub base_branch: String,
    pub worker_ids: Vec<String>,
    pub task_ids: Vec<String>,
    pub project_path: Option<String>,
    pub project_name: Option<String>,
}

/// Parameters for [`PhaseCollector::on_worker_complete`].
pub struct WorkerCompletion {
    pub run_id: String,
    pub phase_number: u32,
    pub worker_id: String,
    pub status: WorkerStatus,
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Result of [`PhaseCollector::on_worker_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub phase_complete: bool,
    pub all_succeeded: bool,
}

/// Tracks workers and branches of one phase and owns its persistence.
pub struct PhaseCollector {
    store: Arc<dyn PhaseStore>,
    vcs: Arc<dyn VcsAdapter>,
    ledger: Arc<dyn EventLedger>,
    locks: RwLock<HashMap<(String, u32), Arc<Mutex<()>>>>,
}

impl PhaseCollector {
    #[must_use]
    pub fn new(store: Arc<dyn PhaseStore>, vcs: Arc<dyn VcsAdapter>, ledger: Arc<dyn EventLedger>) -> Self {
        Self { store, vcs, ledger, locks: RwLock::new(HashMap::new()) }
    }

    async fn lock_for(&self, run_id: &str, phase_number: u32) -> Arc<Mutex<()>> {
        let key = (run_id.to_string(), phase_number);
        if let Some(lock) = self.locks.read().await.get(&key) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Create a new `Phase` record with one `Worker` per id, `pending`,
    /// persisted atomically.
    pub async fn init_phase(&self, params: InitPhase) -> DomainResult<Phase> {
        let lock = self.lock_for(&params.run_id, params.phase_number).await;
        let _guard = lock.lock().await;

        let workers = params
            .worker_ids
            .iter()
            .zip(params.task_ids.iter())
            .map(|(worker_id, task_id)| Worker::new(worker_id.clone(), task_id.clone()))
            .collect();

        let mut phase = Phase::new(params.run_id, params.phase_number, params.repo_dir, params.base_branch, workers);
        phase.project_path = params.project_path;
        phase.project_name = params.project_name;

        self.store.save(&phase).await?;
        self.ledger
            .append(
                &phase.run_id,
                LedgerEntry::new(
                    entry_type::PHASE_INITIALIZED,
                    serde_json::json!({ "phaseNumber": phase.phase_number, "workerCount": phase.workers.len() }),
                ),
            )
            .await?;
        Ok(phase)
    }

    /// Transition a worker to its terminal state. A no-op if the worker is
    /// already terminal, per `spec.md` §4.4.
    pub async fn on_worker_complete(&self, completion: WorkerCompletion) -> DomainResult<CompletionOutcome> {
        let lock = self.lock_for(&completion.run_id, completion.phase_number).await;
        let _guard = lock.lock().await;

        let mut phase = self
            .store
            .load(&completion.run_id, completion.phase_number)
            .await?
            .ok_or(DomainError::PhaseNotFound {
                run_id: completion.run_id.clone(),
                phase_number: completion.phase_number,
            })?;

        let worker = phase
            .worker_mut(&completion.worker_id)
            .ok_or_else(|| DomainError::WorkerNotFound(completion.worker_id.clone()))?;
        worker.complete(completion.status, completion.output, completion.error);
        let worker_failed = worker.status == WorkerStatus::Failed;

        let outcome = CompletionOutcome {
            phase_complete: phase.all_terminal(),
            all_succeeded: phase.all_terminal() && !phase.any_failed(),
        };

        self.store.save(&phase).await?;
        if worker_failed {
            self.ledger
                .append(
                    &completion.run_id,
                    LedgerEntry::new(
                        entry_type::WORKER_FAILED,
                        serde_json::json!({
                            "phaseNumber": completion.phase_number,
                            "workerId": completion.worker_id,
                        }),
                    ),
                )
                .await?;
        }
        Ok(outcome)
    }

    /// All workers terminal AND no failures.
    #[must_use]
    pub fn is_phase_ready_for_collection(phase: &Phase) -> bool {
        phase.all_terminal() && !phase.any_failed()
    }

    /// Compute, filter, and persist the phase's worker branch set.
    ///
    /// Refuses if any worker is non-terminal or failed. Filters branch
    /// candidates to those that exist and carry at least one commit ahead
    /// of `base_branch`. An empty result signals "no-changes" to the
    /// caller, which is a valid outcome, not an error.
    pub async fn collect_phase_branches(&self, run_id: &str, phase_number: u32) -> DomainResult<Vec<String>> {
        let lock = self.lock_for(run_id, phase_number).await;
        let _guard = lock.lock().await;

        let mut phase = self
            .store
            .load(run_id, phase_number)
            .await?
            .ok_or(DomainError::PhaseNotFound { run_id: run_id.to_string(), phase_number })?;

        if phase.any_running() {
            return Err(DomainError::ValidationFailed(
                "cannot collect branches while workers are still running".to_string(),
            ));
        }
        if phase.any_failed() {
            return Err(DomainError::ValidationFailed(
                "cannot collect branches: one or more workers failed".to_string(),
            ));
        }

        let repo_dir = Path::new(&phase.repo_dir);
        let mut branches = Vec::new();
        for worker in &phase.workers {
            let branch = Worktree::worker_branch(run_id, &worker.worker_id);
            if !self.vcs.branch_exists(repo_dir, &branch).await? {
                continue;
            }
            let changed = self.vcs.diff_names(repo_dir, &phase.base_branch, &branch).await?;
            if !changed.is_empty() {
                branches.push(branch);
            }
        }

        if !branches.is_empty() {
            let phase_branch = Worktree::phase_branch(run_id, phase_number);
            if !self.vcs.branch_exists(repo_dir, &phase_branch).await? {
                self.vcs.branch_create(repo_dir, &phase_branch, &phase.base_branch).await?;
            }
            phase.phase_branch = Some(phase_branch);
        }

        phase.collected_branches = Some(branches.clone());
        self.store.save(&phase).await?;
        Ok(branches)
    }

    pub async fn complete_phase(&self, run_id: &str, phase_number: u32) -> DomainResult<()> {
        let lock = self.lock_for(run_id, phase_number).await;
        let _guard = lock.lock().await;

        let mut phase = self
            .store
            .load(run_id, phase_number)
            .await?
            .ok_or(DomainError::PhaseNotFound { run_id: run_id.to_string(), phase_number })?;
        phase.status = PhaseStatus::Completed;
        phase.completed_at = Some(Utc::now());
        self.store.save(&phase).await?;
        self.ledger
            .append(run_id, LedgerEntry::new(entry_type::PHASE_COMPLETED, serde_json::json!({ "phaseNumber": phase_number })))
            .await
    }

    pub async fn fail_phase(&self, run_id: &str, phase_number: u32) -> DomainResult<()> {
        let lock = self.lock_for(run_id, phase_number).await;
        let _guard = lock.lock().await;

        let mut phase = self
            .store
            .load(run_id, phase_number)
            .await?
            .ok_or(DomainError::PhaseNotFound { run_id: run_id.to_string(), phase_number })?;
        phase.status = PhaseStatus::Failed;
        phase.completed_at = Some(Utc::now());
        self.store.save(&phase).await?;
        self.ledger
            .append(run_id, LedgerEntry::new(entry_type::PHASE_FAILED, serde_json::json!({ "phaseNumber": phase_number })))
            .await
    }

    /// Lookup helper used by the conflict resolver to build prompts: map
    /// each branch to the task it was produced from.
    #[must_use]
    pub fn worker_task_contexts<'a>(phase: &'a Phase, branches: &[String], run_id: &str) -> HashMap<String, &'a Worker> {
        let mut contexts = HashMap::new();
        for worker in &phase.workers {
            let branch = Worktree::worker_branch(run_id, &worker.worker_id);
            if branches.contains(&branch) {
                contexts.insert(branch, worker);
            }
        }
        contexts
    }

    /// Resolve task titles for `getWorkerTaskContexts`, given the caller's
    /// already-loaded task set.
    #[must_use]
    pub fn task_titles_for_branches<'a>(
        phase: &Phase,
        branches: &[String],
        run_id: &str,
        tasks: &'a HashMap<String, Task>,
    ) -> HashMap<String, &'a str> {
        let contexts = Self::worker_task_contexts(phase, branches, run_id);
        contexts
            .into_iter()
            .filter_map(|(branch, worker)| {
                tasks.get(&worker.task_id).map(|task| (branch, task.title.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::vcs::{MergeOptions, MergeOutcome, MergeReport};
    use crate::services::phase_store::FilePhaseStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeVcs {
        branches: StdMutex<Vec<String>>,
        changed_files: StdMutex<HashMap<String, Vec<String>>>,
    }

    #[async_trait]
    impl VcsAdapter for FakeVcs {
        async fn worktree_add(&self, _repo: &Path, _path: &Path, _branch: &str, _from_base: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn worktree_remove(&self, _repo: &Path, _path: &Path, _force: bool) -> DomainResult<()> {
            Ok(())
        }
        async fn worktree_prune(&self, _repo: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_create(&self, _repo: &Path, branch: &str, _from: &str) -> DomainResult<()> {
            self.branches.lock().unwrap().push(branch.to_string());
            Ok(())
        }
        async fn branch_delete(&self, _repo: &Path, _branch: &str, _force: bool) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_exists(&self, _repo: &Path, branch: &str) -> DomainResult<bool> {
            Ok(self.branches.lock().unwrap().iter().any(|b| b == branch))
        }
        async fn current_branch(&self, _repo: &Path) -> DomainResult<String> {
            Ok("main".to_string())
        }
        async fn checkout(&self, _repo: &Path, _branch: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn merge(&self, _repo: &Path, _source: &str, _options: MergeOptions) -> DomainResult<MergeReport> {
            Ok(MergeReport { outcome: MergeOutcome::Success, detail: String::new() })
        }
        async fn merge_abort(&self, _repo: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn conflicted_files(&self, _repo: &Path) -> DomainResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn stage(&self, _repo: &Path, _paths: &[String]) -> DomainResult<()> {
            Ok(())
        }
        async fn stage_all(&self, _repo: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn commit(&self, _repo: &Path, _message: &str) -> DomainResult<Option<String>> {
            Ok(Some("deadbeef".to_string()))
        }
        async fn diff_names(&self, _repo: &Path, _base: &str, reference: &str) -> DomainResult<Vec<String>> {
            Ok(self.changed_files.lock().unwrap().get(reference).cloned().unwrap_or_default())
        }
        async fn file_at_ref(&self, _repo: &Path, _path: &str, _reference: &str) -> DomainResult<Option<String>> {
            Ok(None)
        }
        async fn fetch(&self, _repo: &Path, _remote: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn push(&self, _repo: &Path, _remote: &str, _branch: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn merge_base(&self, _repo: &Path, _a: &str, _b: &str) -> DomainResult<String> {
            Ok("deadbeef".to_string())
        }
    }

    struct RecordingLedger {
        entries: StdMutex<Vec<LedgerEntry>>,
    }

    impl RecordingLedger {
        fn new() -> Self {
            Self { entries: StdMutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl EventLedger for RecordingLedger {
        async fn append(&self, _run_id: &str, entry: LedgerEntry) -> DomainResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
        async fn read_all(&self, _run_id: &str) -> DomainResult<Vec<LedgerEntry>> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    fn collector(dir: &std::path::Path) -> (PhaseCollector, Arc<RecordingLedger>) {
        let store = Arc::new(FilePhaseStore::new(dir.to_path_buf()));
        let vcs = Arc::new(FakeVcs::default());
        let ledger = Arc::new(RecordingLedger::new());
        (PhaseCollector::new(store, vcs, ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn init_phase_logs_phase_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let (collector, ledger) = collector(dir.path());

        collector
            .init_phase(InitPhase {
                run_id: "run-1".to_string(),
                phase_number: 1,
                repo_dir: "/repo".to_string(),
                base_branch: "main".to_string(),
                worker_ids: vec!["w1".to_string()],
                task_ids: vec!["t1".to_string()],
                project_path: None,
                project_name: None,
            })
            .await
            .unwrap();

        let entries = ledger.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, entry_type::PHASE_INITIALIZED);
    }

    #[tokio::test]
    async fn worker_failure_logs_worker_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (collector, ledger) = collector(dir.path());

        collector
            .init_phase(InitPhase {
                run_id: "run-1".to_string(),
                phase_number: 1,
                repo_dir: "/repo".to_string(),
                base_branch: "main".to_string(),
                worker_ids: vec!["w1".to_string()],
                task_ids: vec!["t1".to_string()],
                project_path: None,
                project_name: None,
            })
            .await
            .unwrap();

        let outcome = collector
            .on_worker_complete(WorkerCompletion {
                run_id: "run-1".to_string(),
                phase_number: 1,
                worker_id: "w1".to_string(),
                status: WorkerStatus::Failed,
                output: None,
                error: Some("boom".to_string()),
            })
            .await
            .unwrap();

        assert!(outcome.phase_complete);
        assert!(!outcome.all_succeeded);

        let types: Vec<&str> = ledger.entries.lock().unwrap().iter().map(|e| e.entry_type.as_str()).collect();
        assert!(types.contains(&entry_type::WORKER_FAILED));
    }

    #[tokio::test]
    async fn collect_phase_branches_refuses_while_a_worker_is_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (collector, _ledger) = collector(dir.path());

        collector
            .init_phase(InitPhase {
                run_id: "run-1".to_string(),
                phase_number: 1,
                repo_dir: "/repo".to_string(),
                base_branch: "main".to_string(),
                worker_ids: vec!["w1".to_string()],
                task_ids: vec!["t1".to_string()],
                project_path: None,
                project_name: None,
            })
            .await
            .unwrap();

        collector
            .on_worker_complete(WorkerCompletion {
                run_id: "run-1".to_string(),
                phase_number: 1,
                worker_id: "w1".to_string(),
                status: WorkerStatus::Failed,
                output: None,
                error: Some("boom".to_string()),
            })
            .await
            .unwrap();

        let err = collector.collect_phase_branches("run-1", 1).await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn complete_phase_logs_phase_completed() {
        let dir = tempfile::tempdir().unwrap();
        let (collector, ledger) = collector(dir.path());

        collector
            .init_phase(InitPhase {
                run_id: "run-1".to_string(),
                phase_number: 1,
                repo_dir: "/repo".to_string(),
                base_branch: "main".to_string(),
                worker_ids: vec![],
                task_ids: vec![],
                project_path: None,
                project_name: None,
            })
            .await
            .unwrap();

        collector.complete_phase("run-1", 1).await.unwrap();

        let types: Vec<&str> = ledger.entries.lock().unwrap().iter().map(|e| e.entry_type.as_str()).collect();
        assert!(types.contains(&entry_type::PHASE_COMPLETED));
    }
}
