//! `merge`/`resume` CLI commands.

use anyhow::{Context, Result};

use crate::cli::context::ServiceGraph;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::PhaseMergeResult;

impl CommandOutput for PhaseMergeResult {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("status: {:?}", self.status)];
        if let Some(ref branch) = self.phase_branch {
            lines.push(format!("phase branch: {branch}"));
        }
        if !self.merged_branches.is_empty() {
            lines.push(format!("merged: {}", self.merged_branches.join(", ")));
        }
        if let Some(ref info) = self.conflict_info {
            lines.push(format!("conflict on: {} ({} file(s))", info.failed_branch, info.conflict_files.len()));
            lines.push(format!("remaining: {}", info.remaining_branches.join(", ")));
        }
        if let Some(ref error) = self.error {
            lines.push(format!("error: {error}"));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute_merge(
    graph: &ServiceGraph,
    run_id: String,
    phase_number: u32,
    project_goal: Option<String>,
    json_mode: bool,
) -> Result<()> {
    let result = graph
        .orchestrator
        .merge_phase_with_review(&run_id, phase_number, project_goal)
        .await
        .context("merge failed")?;
    output(&result, json_mode);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn execute_resume(
    graph: &ServiceGraph,
    run_id: String,
    phase_number: u32,
    merged_so_far: Vec<String>,
    remaining_branches: Vec<String>,
    project_goal: Option<String>,
    json_mode: bool,
) -> Result<()> {
    let result = graph
        .orchestrator
        .resume_merge_with_review(&run_id, phase_number, merged_so_far, remaining_branches, project_goal)
        .await
        .context("resume failed")?;
    output(&result, json_mode);
    Ok(())
}
