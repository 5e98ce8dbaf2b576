//! `run` CLI command: resolve the next ready group of tasks into a phase,
//! create worktrees, and dispatch an agent per task.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::context::ServiceGraph;
use crate::cli::output::{output, CommandOutput};
use crate::domain::ports::gateway::CleanupPolicy;
use crate::services::agent_dispatch::DispatchRequest;
use crate::services::phase_collector::InitPhase;
use crate::services::task_graph;

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub run_id: String,
    pub phase_number: u32,
    pub worker_ids: Vec<String>,
    pub session_keys: Vec<String>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        format!(
            "Started phase {} of run {} with {} worker(s): {}",
            self.phase_number,
            self.run_id,
            self.worker_ids.len(),
            self.worker_ids.join(", ")
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    graph: &ServiceGraph,
    run_id: String,
    repo_dir: String,
    tasks_file: String,
    base_branch: String,
    json_mode: bool,
) -> Result<()> {
    let task_graph = task_graph::load(std::path::Path::new(&tasks_file))
        .await
        .context("failed to load task list")?;

    if task_graph.has_cycle() {
        anyhow::bail!("task graph has a dependency cycle: {:?}", task_graph.unreachable());
    }

    let ready = task_graph.ready_tasks();
    if ready.is_empty() {
        anyhow::bail!("no ready tasks: every task is done or blocked on an undone dependency");
    }

    let repo_path = std::path::Path::new(&repo_dir);
    let existing = graph.phase_store.list_run(&run_id).await?;
    let phase_number = existing.iter().map(|p| p.phase_number).max().map_or(1, |n| n + 1);

    let worker_ids: Vec<String> = ready.iter().map(|task| format!("w-{}", task.id)).collect();
    let task_ids: Vec<String> = ready.iter().map(|task| task.id.clone()).collect();

    for worker_id in &worker_ids {
        graph.worktrees.create(repo_path, &run_id, worker_id, &base_branch).await?;
    }

    // The Phase record must exist before any worker can possibly report
    // completion, so it is persisted before a single agent is dispatched.
    graph
        .phase_collector
        .init_phase(InitPhase {
            run_id: run_id.clone(),
            phase_number,
            repo_dir: repo_dir.clone(),
            base_branch,
            worker_ids: worker_ids.clone(),
            task_ids,
            project_path: Some(tasks_file),
            project_name: Some(run_id.clone()),
        })
        .await
        .context("failed to persist the new phase")?;

    let mut session_keys = Vec::new();
    for (task, worker_id) in ready.iter().zip(&worker_ids) {
        let dispatch = graph
            .dispatcher
            .spawn(DispatchRequest {
                task: task.title.clone(),
                label: format!("{run_id}-{worker_id}"),
                model: None,
                thinking: None,
                cleanup: CleanupPolicy::Keep,
                run_timeout_seconds: None,
                skip_guard: false,
                skip_verify: false,
                project_name: Some(run_id.clone()),
            })
            .await
            .with_context(|| format!("failed to dispatch worker for task {}", task.id))?;

        session_keys.push(dispatch.session_key);
    }

    let out = RunOutput { run_id, phase_number, worker_ids, session_keys };
    output(&out, json_mode);
    Ok(())
}
