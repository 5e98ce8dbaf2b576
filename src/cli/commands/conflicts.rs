//! `conflicts detect` CLI command.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::context::ServiceGraph;
use crate::cli::output::{output, CommandOutput};

#[derive(Debug, Serialize)]
pub struct ConflictsDetectOutput {
    pub likely_conflicts: Vec<String>,
}

impl CommandOutput for ConflictsDetectOutput {
    fn to_human(&self) -> String {
        if self.likely_conflicts.is_empty() {
            return "No likely conflicts detected.".to_string();
        }
        format!("Likely conflicts: {}", self.likely_conflicts.join(", "))
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(graph: &ServiceGraph, repo_dir: String, base_branch: String, branches: Vec<String>, json_mode: bool) -> Result<()> {
    let likely_conflicts = graph
        .orchestrator
        .detect_potential_conflicts(std::path::Path::new(&repo_dir), &branches, &base_branch)
        .await
        .context("failed to detect potential conflicts")?;

    output(&ConflictsDetectOutput { likely_conflicts }, json_mode);
    Ok(())
}
