//! Event ledger entries.
//!
//! The ledger is an append-only audit trail: entries carry no owner after
//! they are written and are never updated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One append-only ledger entry.
///
/// `payload` holds the type-specific fields (e.g. `worker-spawned` carries
/// `session_key`/`label`; `conflict-resolution` carries `files`). Keeping
/// the payload as a loosely-typed JSON object (rather than an enum of
/// concrete payload structs) matches the append-only, schema-evolving
/// nature of the ledger: new entry types can appear without a crate release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(flatten)]
    pub payload: Value,
}

impl LedgerEntry {
    #[must_use]
    pub fn new(entry_type: impl Into<String>, payload: Value) -> Self {
        Self { timestamp: Utc::now(), entry_type: entry_type.into(), payload }
    }
}

/// Well-known ledger entry types, named in spec.md §4.10.
pub mod entry_type {
    pub const WORKER_SPAWNED: &str = "worker-spawned";
    pub const WORKER_COMPLETED: &str = "worker-completed";
    pub const WORKER_FAILED: &str = "worker-failed";
    pub const PHASE_INITIALIZED: &str = "phase-initialized";
    pub const PHASE_COMPLETED: &str = "phase-completed";
    pub const PHASE_FAILED: &str = "phase-failed";
    pub const CONFLICT_RESOLUTION: &str = "conflict-resolution";
}
