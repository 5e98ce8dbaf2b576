//! Configuration infrastructure.
//!
//! Hierarchical configuration using `figment`: programmatic defaults, a
//! project YAML file, an optional local override, environment variables on
//! top. See [`loader::ConfigLoader`].

pub mod loader;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything needed to wire up the service graph, per `spec.md` §6's
/// environment variable list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for persisted state: `phases/`, `ledger/`, `escalations.json`,
    /// `roles.json` (`ORCHESTRATOR_DATA_DIR`).
    pub orchestrator_data_dir: PathBuf,
    /// Root directory under which project git repositories live
    /// (`PROJECTS_DIR`).
    pub projects_dir: PathBuf,
    /// Path the (out-of-scope) dashboard UI would be served from
    /// (`DASHBOARD_PATH`). Unused by the CLI driver; carried for parity
    /// with the HTTP surface this crate doesn't implement.
    pub dashboard_path: PathBuf,
    /// Port the (out-of-scope) HTTP surface would listen on (`PORT`).
    pub port: u16,
    /// Base URL of the agent gateway (`OPENCLAW_GATEWAY_URL`).
    pub gateway_url: String,
    /// Bearer token for the agent gateway (`OPENCLAW_GATEWAY_TOKEN`).
    pub gateway_token: String,
    /// Root directory worker worktrees are created under
    /// (`SWARMOPS_WORKTREE_DIR`).
    pub worktree_dir: PathBuf,
    /// Bearer token this crate's own (out-of-scope) HTTP surface would
    /// require from callers (`SWARMOPS_API_TOKEN`).
    pub api_token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator_data_dir: PathBuf::from(".swarmops/data"),
            projects_dir: PathBuf::from(".swarmops/projects"),
            dashboard_path: PathBuf::from(".swarmops/dashboard"),
            port: 4242,
            gateway_url: "http://localhost:8787".to_string(),
            gateway_token: String::new(),
            worktree_dir: PathBuf::from(".swarmops/worktrees"),
            api_token: String::new(),
        }
    }
}
