//! Ports: trait boundaries the services layer depends on, implemented by
//! concrete adapters.

pub mod escalation_store;
pub mod event_ledger;
pub mod gateway;
pub mod phase_store;
pub mod vcs;

pub use escalation_store::EscalationStore;
pub use event_ledger::EventLedger;
pub use gateway::{CleanupPolicy, GatewayClient, SessionSummary, SpawnFailure, SpawnOutcome, SpawnParams};
pub use phase_store::PhaseStore;
pub use vcs::{MergeOptions, MergeOutcome, MergeReport, VcsAdapter};
