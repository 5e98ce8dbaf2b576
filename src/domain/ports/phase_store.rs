//! Phase Store port (C4): persistence for the `Phase` record.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Phase;

/// Persists per-phase state, one record per `(run_id, phase_number)`.
#[async_trait]
pub trait PhaseStore: Send + Sync {
    async fn save(&self, phase: &Phase) -> DomainResult<()>;

    async fn load(&self, run_id: &str, phase_number: u32) -> DomainResult<Option<Phase>>;

    async fn delete(&self, run_id: &str, phase_number: u32) -> DomainResult<()>;

    async fn list_run(&self, run_id: &str) -> DomainResult<Vec<Phase>>;
}
