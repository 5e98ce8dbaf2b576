//! Concrete [`VcsAdapter`] over the `git` binary.
//!
//! Every operation shells out via `tokio::process::Command` with argument
//! arrays; no caller-controlled string is ever interpolated into a shell
//! command line. Branch and path arguments are validated before they reach
//! a subprocess.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::vcs::{MergeOptions, MergeOutcome, MergeReport, VcsAdapter};

/// Reject branch names that could be misread as flags or that git itself
/// disallows, grounded on the teacher's `merge_queue::validate_branch_name`.
pub fn validate_branch_name(name: &str) -> DomainResult<()> {
    if name.is_empty() {
        return Err(DomainError::ValidationFailed("branch name cannot be empty".to_string()));
    }
    if name.starts_with('-') {
        return Err(DomainError::ValidationFailed(format!(
            "invalid branch name '{name}': must not start with '-'"
        )));
    }
    if name.contains("..") {
        return Err(DomainError::ValidationFailed(format!(
            "invalid branch name '{name}': must not contain '..'"
        )));
    }
    for ch in name.chars() {
        if ch.is_ascii_control() || matches!(ch, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\') {
            return Err(DomainError::ValidationFailed(format!(
                "invalid branch name '{name}': contains disallowed character '{ch}'"
            )));
        }
    }
    if name.ends_with(".lock") {
        return Err(DomainError::ValidationFailed(format!(
            "invalid branch name '{name}': must not end with '.lock'"
        )));
    }
    Ok(())
}

/// Reject path components that could be misread as flags.
pub fn validate_path_component(component: &str) -> DomainResult<()> {
    if component.is_empty() || component.starts_with('-') {
        return Err(DomainError::ValidationFailed(format!(
            "invalid path component '{component}'"
        )));
    }
    Ok(())
}

/// [`VcsAdapter`] implementation backed by the system `git`.
#[derive(Debug, Clone, Default)]
pub struct GitVcsAdapter;

impl GitVcsAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, repo: &Path, args: &[&str]) -> DomainResult<std::process::Output> {
        debug!(?args, repo = %repo.display(), "running git");
        Command::new("git")
            .args(args)
            .current_dir(repo)
            .output()
            .await
            .map_err(|e| DomainError::Vcs(format!("failed to spawn git {args:?}: {e}")))
    }

    fn ok_or_vcs_error(output: &std::process::Output, context: &str) -> DomainResult<()> {
        if output.status.success() {
            Ok(())
        } else {
            Err(DomainError::Vcs(format!(
                "{context}: {}",
                String::from_utf8_lossy(&output.stderr)
            )))
        }
    }
}

#[async_trait]
impl VcsAdapter for GitVcsAdapter {
    async fn worktree_add(&self, repo: &Path, path: &Path, branch: &str, from_base: &str) -> DomainResult<()> {
        validate_branch_name(branch)?;
        validate_branch_name(from_base)?;
        let path_str = path.to_string_lossy().to_string();
        let output = self
            .run(repo, &["worktree", "add", "-b", branch, &path_str, from_base])
            .await?;
        Self::ok_or_vcs_error(&output, "git worktree add failed")
    }

    async fn worktree_remove(&self, repo: &Path, path: &Path, force: bool) -> DomainResult<()> {
        let path_str = path.to_string_lossy().to_string();
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        let output = self.run(repo, &args).await?;
        if output.status.success() {
            return Ok(());
        }
        // Idempotent: git reports a missing worktree as an error; treat it
        // as success per the Worktree Manager's cleanup contract.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("is not a working tree") || stderr.contains("No such file or directory") {
            return Ok(());
        }
        Err(DomainError::Vcs(format!("git worktree remove failed: {stderr}")))
    }

    async fn worktree_prune(&self, repo: &Path) -> DomainResult<()> {
        let output = self.run(repo, &["worktree", "prune"]).await?;
        Self::ok_or_vcs_error(&output, "git worktree prune failed")
    }

    async fn branch_create(&self, repo: &Path, branch: &str, from: &str) -> DomainResult<()> {
        validate_branch_name(branch)?;
        validate_branch_name(from)?;
        let output = self.run(repo, &["branch", branch, from]).await?;
        Self::ok_or_vcs_error(&output, "git branch create failed")
    }

    async fn branch_delete(&self, repo: &Path, branch: &str, force: bool) -> DomainResult<()> {
        validate_branch_name(branch)?;
        let flag = if force { "-D" } else { "-d" };
        let output = self.run(repo, &["branch", flag, branch]).await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not found") {
            return Ok(());
        }
        Err(DomainError::Vcs(format!("git branch delete failed: {stderr}")))
    }

    async fn branch_exists(&self, repo: &Path, branch: &str) -> DomainResult<bool> {
        validate_branch_name(branch)?;
        let output = self
            .run(repo, &["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .await?;
        Ok(output.status.success())
    }

    async fn current_branch(&self, repo: &Path) -> DomainResult<String> {
        let output = self.run(repo, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Self::ok_or_vcs_error(&output, "git rev-parse failed")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn checkout(&self, repo: &Path, branch: &str) -> DomainResult<()> {
        validate_branch_name(branch)?;
        let output = self.run(repo, &["checkout", branch]).await?;
        Self::ok_or_vcs_error(&output, "git checkout failed")
    }

    async fn merge(&self, repo: &Path, source: &str, options: MergeOptions) -> DomainResult<MergeReport> {
        validate_branch_name(source)?;
        let message = options.message.unwrap_or_else(|| format!("Merge worker branch {source}"));
        let mut args = vec!["merge".to_string(), "--no-ff".to_string()];
        if options.no_commit {
            args.push("--no-commit".to_string());
        }
        args.push("-m".to_string());
        args.push(message);
        args.push("--".to_string());
        args.push(source.to_string());

        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(repo, &args_ref).await?;
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        if output.status.success() {
            return Ok(MergeReport { outcome: MergeOutcome::Success, detail: combined });
        }

        let has_conflict_markers =
            combined.contains("CONFLICT") || combined.contains("<<<<<<<") || combined.contains(">>>>>>>");
        let outcome = if has_conflict_markers { MergeOutcome::Conflict } else { MergeOutcome::Fatal };
        if outcome == MergeOutcome::Fatal {
            warn!(%source, detail = %combined, "git merge failed fatally");
        }
        Ok(MergeReport { outcome, detail: combined })
    }

    async fn merge_abort(&self, repo: &Path) -> DomainResult<()> {
        let output = self.run(repo, &["merge", "--abort"]).await?;
        Self::ok_or_vcs_error(&output, "git merge --abort failed")
    }

    async fn conflicted_files(&self, repo: &Path) -> DomainResult<Vec<String>> {
        let output = self.run(repo, &["diff", "--name-only", "--diff-filter=U"]).await?;
        Self::ok_or_vcs_error(&output, "git diff --diff-filter=U failed")?;
        Ok(parse_lines(&output.stdout))
    }

    async fn stage(&self, repo: &Path, paths: &[String]) -> DomainResult<()> {
        for path in paths {
            validate_path_component(path)?;
        }
        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(paths.iter().cloned());
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run(repo, &args_ref).await?;
        Self::ok_or_vcs_error(&output, "git add failed")
    }

    async fn stage_all(&self, repo: &Path) -> DomainResult<()> {
        let output = self.run(repo, &["add", "-A"]).await?;
        Self::ok_or_vcs_error(&output, "git add -A failed")
    }

    async fn commit(&self, repo: &Path, message: &str) -> DomainResult<Option<String>> {
        let status_output = self.run(repo, &["status", "--porcelain"]).await?;
        Self::ok_or_vcs_error(&status_output, "git status failed")?;
        if status_output.stdout.is_empty() {
            return Ok(None);
        }

        let output = self.run(repo, &["commit", "-m", message]).await?;
        Self::ok_or_vcs_error(&output, "git commit failed")?;

        let rev_parse = self.run(repo, &["rev-parse", "HEAD"]).await?;
        Self::ok_or_vcs_error(&rev_parse, "git rev-parse failed")?;
        Ok(Some(String::from_utf8_lossy(&rev_parse.stdout).trim().to_string()))
    }

    async fn diff_names(&self, repo: &Path, base: &str, reference: &str) -> DomainResult<Vec<String>> {
        validate_branch_name(base)?;
        validate_branch_name(reference)?;
        let range = format!("{base}...{reference}");
        let output = self.run(repo, &["diff", "--name-only", &range]).await?;
        Self::ok_or_vcs_error(&output, "git diff --name-only failed")?;
        Ok(parse_lines(&output.stdout))
    }

    async fn file_at_ref(&self, repo: &Path, path: &str, reference: &str) -> DomainResult<Option<String>> {
        validate_branch_name(reference)?;
        validate_path_component(path)?;
        let spec = format!("{reference}:{path}");
        let output = self.run(repo, &["show", &spec]).await?;
        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()))
        } else {
            Ok(None)
        }
    }

    async fn fetch(&self, repo: &Path, remote: &str) -> DomainResult<()> {
        validate_path_component(remote)?;
        let output = self.run(repo, &["fetch", remote]).await?;
        if !output.status.success() {
            warn!(remote, detail = %String::from_utf8_lossy(&output.stderr), "best-effort fetch failed");
        }
        Ok(())
    }

    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> DomainResult<()> {
        validate_path_component(remote)?;
        validate_branch_name(branch)?;
        let output = self.run(repo, &["push", remote, branch]).await?;
        if !output.status.success() {
            warn!(remote, branch, detail = %String::from_utf8_lossy(&output.stderr), "best-effort push failed");
        }
        Ok(())
    }

    async fn merge_base(&self, repo: &Path, a: &str, b: &str) -> DomainResult<String> {
        validate_branch_name(a)?;
        validate_branch_name(b)?;
        let output = self.run(repo, &["merge-base", a, b]).await?;
        Self::ok_or_vcs_error(&output, "git merge-base failed")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn parse_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_flag_like_branch_names() {
        assert!(validate_branch_name("-rf").is_err());
        assert!(validate_branch_name("").is_err());
        assert!(validate_branch_name("feature..evil").is_err());
        assert!(validate_branch_name("valid/branch-name").is_ok());
    }

    #[test]
    fn rejects_disallowed_characters() {
        assert!(validate_branch_name("has space").is_err());
        assert!(validate_branch_name("has~tilde").is_err());
        assert!(validate_branch_name("ends.lock").is_err());
    }

    async fn init_repo(dir: &Path) {
        let run = |args: &'static [&'static str]| {
            let dir = dir.to_path_buf();
            async move {
                Command::new("git").args(args).current_dir(&dir).output().await.unwrap()
            }
        };
        run(&["init", "-q"]).await;
        run(&["config", "user.email", "test@example.com"]).await;
        run(&["config", "user.name", "Test"]).await;
        run(&["commit", "--allow-empty", "-q", "-m", "init"]).await;
    }

    #[tokio::test]
    async fn merge_of_disjoint_changes_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        init_repo(dir.path()).await;
        let adapter = GitVcsAdapter::new();

        adapter.branch_create(dir.path(), "feature", "HEAD").await.unwrap();
        adapter.checkout(dir.path(), "feature").await.unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "hello").await.unwrap();
        adapter.stage_all(dir.path()).await.unwrap();
        adapter.commit(dir.path(), "add a.txt").await.unwrap();

        adapter.checkout(dir.path(), "master").await.unwrap_or(());
        let current = adapter.current_branch(dir.path()).await.unwrap();
        let report = adapter.merge(dir.path(), "feature", MergeOptions::default()).await.unwrap();
        assert_eq!(report.outcome, MergeOutcome::Success);
        let _ = current;
    }
}
