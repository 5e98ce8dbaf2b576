//! Domain model entities shared across services and adapters.

pub mod circuit;
pub mod ledger;
pub mod phase;
pub mod review;
pub mod role;
pub mod task;
pub mod worker;
pub mod worktree;

pub use circuit::CircuitState;
pub use ledger::{entry_type, LedgerEntry};
pub use phase::{
    ConflictInfo, ConflictRisk, MergeStats, MergeStatus, Phase, PhaseMergeResult, PhaseStatus,
};
pub use review::{Escalation, EscalationStatus, ReviewChainPhase, ReviewChainState, ReviewDecision};
pub use role::{RoleConfig, RoleRegistry};
pub use task::{Task, TaskGraph, DEFAULT_ROLE};
pub use worker::{Worker, WorkerStatus};
pub use worktree::{Worktree, BRANCH_PREFIX};
