//! Escalation store port: the `escalations.json` document named in
//! `spec.md` §6's persisted-state layout.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Escalation;

/// Atomically-rewritten collection of human-owned escalation records.
#[async_trait]
pub trait EscalationStore: Send + Sync {
    async fn create(&self, escalation: Escalation) -> DomainResult<()>;

    async fn get(&self, id: &str) -> DomainResult<Option<Escalation>>;

    async fn update(&self, escalation: Escalation) -> DomainResult<()>;

    async fn list_open(&self) -> DomainResult<Vec<Escalation>>;
}
