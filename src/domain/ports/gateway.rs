//! Gateway client port (C8's transport dependency): the external spawn RPC.
//!
//! Modeled as an explicit sum type per `spec.md` §9 — the gateway's
//! alternative response shapes (`result.details.childSessionKey` vs
//! `result.childSessionKey`) are normalized by the adapter into one
//! [`SpawnOutcome`] rather than forwarded as ad-hoc JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;

/// `cleanup` policy passed to `sessions_spawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupPolicy {
    Delete,
    Keep,
}

/// Parameters for one spawn attempt, pre-guard (the caller's label has not
/// yet had the uniqueness suffix appended).
#[derive(Debug, Clone)]
pub struct SpawnParams {
    pub task: String,
    pub label: String,
    pub model: Option<String>,
    pub thinking: Option<String>,
    pub cleanup: CleanupPolicy,
    pub run_timeout_seconds: Option<u64>,
}

/// Why a raw spawn RPC call failed, classified per `spec.md` §4.7 step 4.
#[derive(Debug, Clone)]
pub enum SpawnFailure {
    Http(u16),
    SpawnError(String),
}

/// Outcome of a single `sessions_spawn` RPC call (before verification).
#[derive(Debug, Clone)]
pub enum SpawnOutcome {
    Accepted { session_key: String, run_id: Option<String> },
    Rejected(SpawnFailure),
}

/// One entry of a `sessions_list` response.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_key: String,
    pub total_tokens: u64,
    pub model: Option<String>,
    pub last_stop_reason: Option<String>,
    pub message_count: usize,
}

/// Transport to the external agent gateway (C8's dependency, grounded on
/// the teacher's `ClaudeClient` shape but targeting the `tools/invoke`
/// surface in `spec.md` §6 instead of `/v1/messages`).
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Raw `sessions_spawn` call. Does not itself apply circuit breaking,
    /// rate limiting, or backoff — that is [`crate::services::agent_dispatch`]'s job.
    async fn sessions_spawn(&self, params: &SpawnParams) -> DomainResult<SpawnOutcome>;

    /// Raw `sessions_list` call used both for verification polling and for
    /// the Worker Tracker's liveness polling.
    async fn sessions_list(&self, limit: u32, message_limit: u32) -> DomainResult<Vec<SessionSummary>>;
}
