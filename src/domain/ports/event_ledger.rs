//! Event Ledger port (C11): append-only audit trail.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::LedgerEntry;

/// Append-only JSONL event stream, one file per run.
///
/// There is no update or delete operation: entries have no owner once
/// written, per `spec.md` §3's ownership rules.
#[async_trait]
pub trait EventLedger: Send + Sync {
    async fn append(&self, run_id: &str, entry: LedgerEntry) -> DomainResult<()>;

    /// Read back every entry written for `run_id`, in write order. Intended
    /// for `ledger tail`-style inspection, not for hot-path logic.
    async fn read_all(&self, run_id: &str) -> DomainResult<Vec<LedgerEntry>>;
}
