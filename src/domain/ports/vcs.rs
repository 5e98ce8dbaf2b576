//! VCS Adapter port (C1): a thin façade over the version-control tool.
//!
//! All operations are argument-array based; implementations must never
//! build a shell command line from caller-provided strings.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::DomainResult;

/// How a merge attempt concluded, per `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Success,
    Conflict,
    Fatal,
}

/// Options for [`VcsAdapter::merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub message: Option<String>,
    pub no_commit: bool,
}

/// Result of a merge attempt: the classified outcome plus raw tool output,
/// kept together so callers can log the detail without a second call.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub outcome: MergeOutcome,
    pub detail: String,
}

/// Thin façade over the version-control tool (C1).
///
/// Every method maps to a single subprocess invocation. Implementations
/// validate branch/path arguments before they reach the subprocess so a
/// caller-controlled string can never be interpreted as a flag.
#[async_trait]
pub trait VcsAdapter: Send + Sync {
    async fn worktree_add(&self, repo: &Path, path: &Path, branch: &str, from_base: &str) -> DomainResult<()>;

    async fn worktree_remove(&self, repo: &Path, path: &Path, force: bool) -> DomainResult<()>;

    async fn worktree_prune(&self, repo: &Path) -> DomainResult<()>;

    async fn branch_create(&self, repo: &Path, branch: &str, from: &str) -> DomainResult<()>;

    async fn branch_delete(&self, repo: &Path, branch: &str, force: bool) -> DomainResult<()>;

    async fn branch_exists(&self, repo: &Path, branch: &str) -> DomainResult<bool>;

    async fn current_branch(&self, repo: &Path) -> DomainResult<String>;

    async fn checkout(&self, repo: &Path, branch: &str) -> DomainResult<()>;

    /// Merge `source` into the currently checked out branch of `repo`.
    async fn merge(&self, repo: &Path, source: &str, options: MergeOptions) -> DomainResult<MergeReport>;

    async fn merge_abort(&self, repo: &Path) -> DomainResult<()>;

    async fn conflicted_files(&self, repo: &Path) -> DomainResult<Vec<String>>;

    async fn stage(&self, repo: &Path, paths: &[String]) -> DomainResult<()>;

    async fn stage_all(&self, repo: &Path) -> DomainResult<()>;

    /// Commit staged changes. Returns `None` when there was nothing to
    /// commit (a no-op commit, per the Worktree Manager's `commit` contract).
    async fn commit(&self, repo: &Path, message: &str) -> DomainResult<Option<String>>;

    /// Name-only diff between `base` and `reference`.
    async fn diff_names(&self, repo: &Path, base: &str, reference: &str) -> DomainResult<Vec<String>>;

    /// Read `path` as it exists at `reference`. `None` means the path does
    /// not exist at that ref — a permitted, non-error outcome.
    async fn file_at_ref(&self, repo: &Path, path: &str, reference: &str) -> DomainResult<Option<String>>;

    async fn fetch(&self, repo: &Path, remote: &str) -> DomainResult<()>;

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> DomainResult<()>;

    /// Merge-base of two refs, used to populate [`crate::domain::models::ConflictInfo::merge_base`].
    async fn merge_base(&self, repo: &Path, a: &str, b: &str) -> DomainResult<String>;
}
