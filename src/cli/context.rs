//! Builds the service graph each CLI command needs from loaded [`Config`],
//! grounded on the teacher's `main.rs` wiring of repositories/services
//! before dispatching into command handlers.

use std::sync::Arc;

use crate::adapters::gateway::HttpGatewayClient;
use crate::adapters::ledger::{FileEscalationStore, FileEventLedger};
use crate::adapters::vcs::GitVcsAdapter;
use crate::domain::models::RoleRegistry;
use crate::domain::ports::{EventLedger, GatewayClient, PhaseStore, VcsAdapter};
use crate::infrastructure::Config;
use crate::services::{
    AgentDispatcher, ConflictResolverDispatcher, DispatchConfig, FilePhaseStore, MergeEngine, Orchestrator,
    PhaseCollector, ReviewChainEngine, WorkerTracker, WorktreeManager,
};

/// Every wired-up service a CLI command might need, built once per
/// invocation from [`Config`].
pub struct ServiceGraph {
    pub orchestrator: Orchestrator,
    pub phase_store: Arc<dyn PhaseStore>,
    pub ledger: Arc<dyn EventLedger>,
    pub vcs: Arc<dyn VcsAdapter>,
    pub dispatcher: Arc<AgentDispatcher>,
    pub phase_collector: Arc<PhaseCollector>,
    pub worktrees: WorktreeManager,
}

impl ServiceGraph {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let vcs: Arc<dyn VcsAdapter> = Arc::new(GitVcsAdapter::new());
        let phase_store: Arc<dyn PhaseStore> = Arc::new(FilePhaseStore::new(config.orchestrator_data_dir.clone()));
        let ledger: Arc<dyn EventLedger> = Arc::new(FileEventLedger::new(config.orchestrator_data_dir.clone()));
        let escalations = Arc::new(FileEscalationStore::new(config.orchestrator_data_dir.clone()));
        let gateway: Arc<dyn GatewayClient> = Arc::new(HttpGatewayClient::new(&config.gateway_url, &config.gateway_token)?);

        let roles_path = config.orchestrator_data_dir.join("roles.json");
        let roles = crate::services::role_registry::load(&roles_path).await?;

        let tracker = Arc::new(WorkerTracker::new(gateway.clone(), ledger.clone()));
        let dispatcher = Arc::new(AgentDispatcher::new(gateway, ledger.clone(), tracker, DispatchConfig::default()));
        let phase_collector = Arc::new(PhaseCollector::new(phase_store.clone(), vcs.clone(), ledger.clone()));
        let resolver = Arc::new(ConflictResolverDispatcher::new(vcs.clone(), dispatcher.clone(), ledger.clone()));
        let reviews = Arc::new(ReviewChainEngine::new(vcs.clone(), dispatcher.clone(), roles, escalations));
        let merges = Arc::new(MergeEngine::new(phase_store.clone(), phase_collector.clone(), vcs.clone(), resolver, reviews.clone()));
        let orchestrator = Orchestrator::new(phase_store.clone(), merges, reviews);
        let worktrees = WorktreeManager::new(vcs.clone(), config.worktree_dir.clone());

        Ok(Self { orchestrator, phase_store, ledger, vcs, dispatcher, phase_collector, worktrees })
    }
}
