//! swarmops - multi-agent code-change orchestrator
//!
//! Task graph resolution, per-worker git worktree isolation, phase
//! lifecycle (parallel workers, sequential merge), a guarded agent
//! dispatch client, a sequential review chain, and an append-only event
//! ledger, exposed as the Orchestrator Façade.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::{DomainError, DomainResult};
pub use services::Orchestrator;
