//! Conflict Resolver Dispatcher (C7): builds a context-rich prompt from
//! phase state plus branch diffs and spawns an AI agent to resolve
//! conflicts in place, logging the attempt.
//!
//! Grounded on the teacher's `merge_queue::get_conflicts_needing_resolution`
//! bookkeeping half; the spawn half reuses [`crate::services::agent_dispatch`].
//! Only the "smart" (context-rich) prompt flavor is implemented, per the
//! Open Question decision in `DESIGN.md`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::ledger::entry_type;
use crate::domain::models::LedgerEntry;
use crate::domain::ports::gateway::CleanupPolicy;
use crate::domain::ports::EventLedger;
use crate::services::agent_dispatch::{AgentDispatcher, DispatchRequest};

/// Parameters for one conflict-resolution dispatch.
pub struct ResolveConflict {
    pub run_id: String,
    pub phase_number: u32,
    pub repo_path: std::path::PathBuf,
    pub source_branch: String,
    pub target_branch: String,
    pub conflict_files: Vec<String>,
    pub project_goal: Option<String>,
    /// The failing branch's task description.
    pub source_task: String,
    /// Descriptions of tasks already merged into the target/phase branch,
    /// keyed by branch name, per `getWorkerTaskContexts`.
    pub merged_task_descriptions: HashMap<String, String>,
}

/// Outcome of a resolver dispatch attempt.
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub success: bool,
    pub session_key: Option<String>,
    pub error: Option<String>,
}

/// One file's three-way content for the resolver prompt.
struct ConflictFileContent {
    path: String,
    working_tree: String,
    at_source: Option<String>,
    at_target: Option<String>,
}

/// Dispatches an AI agent to resolve merge conflicts left in place by the
/// Sequential Merge Engine.
pub struct ConflictResolverDispatcher {
    vcs: Arc<dyn crate::domain::ports::VcsAdapter>,
    dispatcher: Arc<AgentDispatcher>,
    ledger: Arc<dyn EventLedger>,
}

impl ConflictResolverDispatcher {
    #[must_use]
    pub fn new(
        vcs: Arc<dyn crate::domain::ports::VcsAdapter>,
        dispatcher: Arc<AgentDispatcher>,
        ledger: Arc<dyn EventLedger>,
    ) -> Self {
        Self { vcs, dispatcher, ledger }
    }

    /// Steps 1-5 of `spec.md` §4.6. The resolver's actual editing/staging/
    /// committing work happens outside this component in the spawned
    /// session; this only builds the prompt, dispatches, and logs.
    pub async fn resolve(&self, params: ResolveConflict) -> DomainResult<ResolveOutcome> {
        let mut file_blocks = Vec::with_capacity(params.conflict_files.len());
        for path in &params.conflict_files {
            let working_tree = tokio::fs::read_to_string(params.repo_path.join(path))
                .await
                .unwrap_or_else(|_| "<unreadable working-tree file>".to_string());
            let at_source = self.vcs.file_at_ref(&params.repo_path, path, &params.source_branch).await?;
            let at_target = self.vcs.file_at_ref(&params.repo_path, path, &params.target_branch).await?;
            file_blocks.push(ConflictFileContent {
                path: path.clone(),
                working_tree,
                at_source,
                at_target,
            });
        }

        let prompt = build_prompt(&params, &file_blocks);
        let label = format!("conflict-resolver:{}:{}", params.phase_number, params.run_id);

        let result = self
            .dispatcher
            .spawn(DispatchRequest {
                task: prompt,
                label,
                model: None,
                thinking: None,
                cleanup: CleanupPolicy::Keep,
                run_timeout_seconds: None,
                skip_guard: false,
                skip_verify: false,
                project_name: None,
            })
            .await;

        self.ledger
            .append(
                &params.run_id,
                LedgerEntry::new(
                    entry_type::CONFLICT_RESOLUTION,
                    serde_json::json!({
                        "phaseNumber": params.phase_number,
                        "sourceBranch": params.source_branch,
                        "targetBranch": params.target_branch,
                        "files": params.conflict_files,
                        "status": "started",
                    }),
                ),
            )
            .await?;

        match result {
            Ok(success) => Ok(ResolveOutcome { success: true, session_key: Some(success.session_key), error: None }),
            Err(err) => Ok(ResolveOutcome { success: false, session_key: None, error: Some(err.to_string()) }),
        }
    }
}

fn build_prompt(params: &ResolveConflict, files: &[ConflictFileContent]) -> String {
    let mut prompt = String::new();

    if let Some(goal) = &params.project_goal {
        prompt.push_str("## Project goal\n");
        prompt.push_str(goal);
        prompt.push_str("\n\n");
    }

    prompt.push_str("## Task that produced the failing branch\n");
    prompt.push_str(&params.source_task);
    prompt.push_str("\n\n");

    if !params.merged_task_descriptions.is_empty() {
        prompt.push_str("## Previously merged tasks in this phase\n");
        for (branch, description) in &params.merged_task_descriptions {
            prompt.push_str(&format!("- {branch}: {description}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "## Conflict\n{} could not be merged into {} cleanly.\n\n",
        params.source_branch, params.target_branch
    ));

    for file in files {
        prompt.push_str(&format!("### {}\n\n", file.path));
        prompt.push_str("Working tree (contains conflict markers):\n```\n");
        prompt.push_str(&file.working_tree);
        prompt.push_str("\n```\n\n");
        prompt.push_str(&format!("At `{}`:\n```\n", params.source_branch));
        prompt.push_str(file.at_source.as_deref().unwrap_or("<absent at this ref>"));
        prompt.push_str("\n```\n\n");
        prompt.push_str(&format!("At `{}`:\n```\n", params.target_branch));
        prompt.push_str(file.at_target.as_deref().unwrap_or("<absent at this ref>"));
        prompt.push_str("\n```\n\n");
    }

    prompt.push_str(
        "Resolve every conflict above in the working tree, `git add` the resolved \
         files, and commit the resolution. When done, POST a completion \
         notification to the orchestrator's fix-complete callback.\n",
    );
    prompt
}
