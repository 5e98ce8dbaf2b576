//! Application services: the orchestration core's C1-C12 behavior, built
//! on top of `domain::ports` traits and `domain::models` entities.

pub mod agent_dispatch;
pub mod conflict_resolver;
pub mod event_ledger;
pub mod merge_engine;
pub mod orchestrator;
pub mod phase_collector;
pub mod phase_store;
pub mod review_chain;
pub mod role_registry;
pub mod task_graph;
pub mod worker_tracker;
pub mod worktree_manager;

pub use agent_dispatch::{AgentDispatcher, DispatchConfig, DispatchRequest, DispatchSuccess};
pub use conflict_resolver::{ConflictResolverDispatcher, ResolveConflict, ResolveOutcome};
pub use event_ledger::LedgerReader;
pub use merge_engine::{MergeEngine, MergeInput, ResumeInput};
pub use orchestrator::Orchestrator;
pub use phase_collector::{CompletionOutcome, InitPhase, PhaseCollector, WorkerCompletion};
pub use phase_store::FilePhaseStore;
pub use review_chain::{ReviewChainEngine, ReviewChainOutcome};
pub use worker_tracker::WorkerTracker;
pub use worktree_manager::WorktreeManager;
