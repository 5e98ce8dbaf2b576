//! Worktree Manager (C2): owns the `runId × workerId -> (path, branch)`
//! mapping and the lifecycle of isolated worktrees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Worktree;
use crate::domain::ports::vcs::VcsAdapter;

/// Creates, commits to, pushes, and tears down per-worker worktrees.
pub struct WorktreeManager {
    vcs: Arc<dyn VcsAdapter>,
    worktree_root: PathBuf,
}

impl WorktreeManager {
    #[must_use]
    pub fn new(vcs: Arc<dyn VcsAdapter>, worktree_root: PathBuf) -> Self {
        Self { vcs, worktree_root }
    }

    /// Create an isolated worktree for `worker_id`, idempotently.
    ///
    /// If a worktree or branch from a prior attempt already occupies the
    /// deterministic path/branch name, both are removed first so the
    /// caller always starts from a clean working tree.
    pub async fn create(
        &self,
        repo_dir: &Path,
        run_id: &str,
        worker_id: &str,
        base_branch: &str,
    ) -> DomainResult<Worktree> {
        if !repo_dir.join(".git").exists() {
            return Err(DomainError::ValidationFailed(format!(
                "{} is not a git working copy",
                repo_dir.display()
            )));
        }

        let path = Worktree::worker_path(&self.worktree_root, run_id, worker_id);
        let branch = Worktree::worker_branch(run_id, worker_id);

        if path.exists() {
            info!(%branch, path = %path.display(), "removing stale worktree before recreate");
            self.vcs.worktree_remove(repo_dir, &path, true).await?;
        }
        if self.vcs.branch_exists(repo_dir, &branch).await? {
            self.vcs.branch_delete(repo_dir, &branch, true).await?;
        }

        self.vcs.fetch(repo_dir, "origin").await.ok();
        self.vcs.worktree_add(repo_dir, &path, &branch, base_branch).await?;

        Ok(Worktree {
            run_id: run_id.to_string(),
            worker_id: worker_id.to_string(),
            path,
            branch,
            base_branch: base_branch.to_string(),
            repo_dir: repo_dir.to_path_buf(),
        })
    }

    /// Stage and commit all changes in `worktree_path`. `None` when there
    /// was nothing to commit.
    pub async fn commit(
        &self,
        worktree_path: &Path,
        message: &str,
    ) -> DomainResult<Option<String>> {
        self.vcs.stage_all(worktree_path).await?;
        self.vcs.commit(worktree_path, message).await
    }

    /// Best-effort push of the worker's branch.
    pub async fn push(&self, worktree: &Worktree, remote: &str) -> DomainResult<()> {
        self.vcs.push(&worktree.path, remote, &worktree.branch).await
    }

    /// Remove one worker's worktree, optionally deleting its branch.
    ///
    /// A non-existent worktree is treated as success (idempotent cleanup).
    /// A removal git refuses is retried once with `--force`, then with a
    /// manual directory removal plus `worktree prune`.
    pub async fn cleanup(
        &self,
        repo_dir: &Path,
        run_id: &str,
        worker_id: &str,
        delete_branch: bool,
    ) -> DomainResult<()> {
        let path = Worktree::worker_path(&self.worktree_root, run_id, worker_id);

        if self.vcs.worktree_remove(repo_dir, &path, false).await.is_err() {
            if let Err(err) = self.vcs.worktree_remove(repo_dir, &path, true).await {
                warn!(%err, path = %path.display(), "forced worktree remove failed, falling back to manual removal");
                if path.exists() {
                    tokio::fs::remove_dir_all(&path).await?;
                }
                self.vcs.worktree_prune(repo_dir).await?;
            }
        }

        if delete_branch {
            let branch = Worktree::worker_branch(run_id, worker_id);
            self.vcs.branch_delete(repo_dir, &branch, true).await?;
        }

        Ok(())
    }

    /// Remove every worktree under `run_id`, optionally deleting every
    /// branch matching the run's branch prefix.
    pub async fn cleanup_run(
        &self,
        repo_dir: &Path,
        run_id: &str,
        worker_ids: &[String],
        delete_branches: bool,
    ) -> DomainResult<()> {
        for worker_id in worker_ids {
            self.cleanup(repo_dir, run_id, worker_id, delete_branches).await?;
        }

        let run_dir = self.worktree_root.join(run_id);
        if run_dir.exists() {
            tokio::fs::remove_dir_all(&run_dir).await?;
        }
        self.vcs.worktree_prune(repo_dir).await?;
        Ok(())
    }

    /// Enumerate worktrees this manager would expect for `run_id`.
    #[must_use]
    pub fn list_run(&self, run_id: &str, worker_ids: &[String]) -> Vec<Worktree> {
        worker_ids
            .iter()
            .map(|worker_id| Worktree {
                run_id: run_id.to_string(),
                worker_id: worker_id.clone(),
                path: Worktree::worker_path(&self.worktree_root, run_id, worker_id),
                branch: Worktree::worker_branch(run_id, worker_id),
                base_branch: String::new(),
                repo_dir: PathBuf::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::vcs::{MergeOptions, MergeOutcome, MergeReport};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeVcs {
        existing_branches: Mutex<Vec<String>>,
        existing_paths: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl VcsAdapter for FakeVcs {
        async fn worktree_add(&self, _repo: &Path, path: &Path, branch: &str, _from_base: &str) -> DomainResult<()> {
            self.existing_branches.lock().unwrap().push(branch.to_string());
            self.existing_paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
        async fn worktree_remove(&self, _repo: &Path, path: &Path, _force: bool) -> DomainResult<()> {
            self.existing_paths.lock().unwrap().retain(|p| p != path);
            Ok(())
        }
        async fn worktree_prune(&self, _repo: &Path) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_create(&self, _repo: &Path, _branch: &str, _from: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn branch_delete(&self, _repo: &Path, branch: &str, _force: bool) -> DomainResult<()> {
            self.existing_branches.lock().unwrap().retain(|b| b != branch);
            Ok(())
        }
        async fn branch_exists(&self, _repo: &Path, branch: &str) -> DomainResult<bool> {
            Ok(self.existing_branches.lock().unwrap().iter().any(|b| b == branch))
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
        async fn diff_names(&self, _repo: &Path, _base: &str, _reference: &str) -> DomainResult<Vec<String>> {
            Ok(Vec::new())
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

    #[tokio::test]
    async fn create_rejects_non_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorktreeManager::new(Arc::new(FakeVcs::default()), dir.path().join("worktrees"));
        let err = manager.create(dir.path(), "run-1", "w-1", "main").await.unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn create_is_idempotent_on_repeated_calls() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(dir.path().join(".git")).await.unwrap();
        let manager = WorktreeManager::new(Arc::new(FakeVcs::default()), dir.path().join("worktrees"));

        let first = manager.create(dir.path(), "run-1", "w-1", "main").await.unwrap();
        let second = manager.create(dir.path(), "run-1", "w-1", "main").await.unwrap();
        assert_eq!(first.path, second.path);
        assert_eq!(first.branch, second.branch);
    }
}
