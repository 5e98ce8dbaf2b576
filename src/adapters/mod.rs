//! Concrete adapters implementing the `domain::ports` traits.

pub mod gateway;
pub mod ledger;
pub mod vcs;

pub use gateway::HttpGatewayClient;
pub use ledger::{FileEscalationStore, FileEventLedger};
pub use vcs::GitVcsAdapter;
