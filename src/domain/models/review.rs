//! Review chain and escalation domain models.
//!
//! The chain's "reset on fix, advance on approve" behavior is a small state
//! machine: `AwaitingReviewer<idx> -> AwaitingFixer -> AwaitingReviewer<0>`
//! on fix, `AwaitingReviewer<idx> -> AwaitingReviewer<idx+1>` on approve,
//! terminating in `Completed` once every chain member has approved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the review chain currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ReviewChainPhase {
    AwaitingReviewer { index: usize },
    AwaitingFixer,
    Completed,
}

/// Ordered reviewer roles for one phase and how far the phase has advanced
/// through them.
///
/// Invariant: `0 <= current_index <= chain.len()`; `approvals` equals
/// `chain[0..current_index]` in order whenever no reset has occurred since
/// the chain started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewChainState {
    pub run_id: String,
    pub phase_number: u32,
    pub chain: Vec<String>,
    pub current_index: usize,
    pub approvals: Vec<String>,
}

impl ReviewChainState {
    #[must_use]
    pub fn new(run_id: impl Into<String>, phase_number: u32, chain: Vec<String>) -> Self {
        Self {
            run_id: run_id.into(),
            phase_number,
            chain,
            current_index: 0,
            approvals: Vec::new(),
        }
    }

    #[must_use]
    pub fn current_role(&self) -> Option<&str> {
        self.chain.get(self.current_index).map(String::as_str)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.current_index == self.chain.len()
    }

    /// Append `approved_role` to `approvals` and advance to the next
    /// reviewer. Returns `true` when the chain is now complete.
    pub fn advance(&mut self, approved_role: impl Into<String>) -> bool {
        self.approvals.push(approved_role.into());
        self.current_index += 1;
        self.is_complete()
    }

    /// Restart the chain from its first reviewer after a fixer has run.
    pub fn reset(&mut self) {
        self.current_index = 0;
        self.approvals.clear();
    }

    #[must_use]
    pub fn phase(&self) -> ReviewChainPhase {
        if self.is_complete() {
            ReviewChainPhase::Completed
        } else {
            ReviewChainPhase::AwaitingReviewer { index: self.current_index }
        }
    }
}

/// A decision returned by a spawned reviewer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum ReviewDecision {
    Approve,
    Fix { fix_instructions: String },
    Escalate { escalation_reason: String },
}

/// Status of a human-owned escalation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationStatus {
    Open,
    Resolved,
    Dismissed,
}

/// Raised when a reviewer escalates or a non-recoverable failure surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub id: String,
    pub reason: String,
    pub status: EscalationStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution: Option<String>,
}

impl Escalation {
    #[must_use]
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reason: reason.into(),
            status: EscalationStatus::Open,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
            resolution: None,
        }
    }

    pub fn resolve(&mut self, resolved_by: impl Into<String>, resolution: impl Into<String>) {
        self.status = EscalationStatus::Resolved;
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(resolved_by.into());
        self.resolution = Some(resolution.into());
    }

    pub fn dismiss(&mut self, resolved_by: impl Into<String>) {
        self.status = EscalationStatus::Dismissed;
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(resolved_by.into());
    }
}
