//! Event Ledger (C11) convenience layer atop the [`EventLedger`] port.
//!
//! The port itself only has `append`/`read_all`; the entries that actually
//! get appended (`phase-initialized`, `worker-failed`, `conflict-resolution`,
//! etc.) are written directly by the component that owns each event, per
//! `spec.md` §4.10. This module is the read side: formatting entries for
//! human consumption, e.g. the CLI's `ledger tail` subcommand.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::LedgerEntry;
use crate::domain::ports::EventLedger;

/// Read-only view over one run's ledger, for inspection tooling.
pub struct LedgerReader {
    ledger: Arc<dyn EventLedger>,
}

impl LedgerReader {
    #[must_use]
    pub fn new(ledger: Arc<dyn EventLedger>) -> Self {
        Self { ledger }
    }

    /// All entries for `run_id`, in write order.
    pub async fn tail(&self, run_id: &str) -> DomainResult<Vec<LedgerEntry>> {
        self.ledger.read_all(run_id).await
    }

    /// Entries for `run_id` restricted to one or more entry types, in write
    /// order. Used by `ledger tail --type worker-failed`.
    pub async fn tail_filtered(&self, run_id: &str, entry_types: &[&str]) -> DomainResult<Vec<LedgerEntry>> {
        let entries = self.ledger.read_all(run_id).await?;
        Ok(entries.into_iter().filter(|e| entry_types.contains(&e.entry_type.as_str())).collect())
    }
}

/// One line of human-readable output, `"<timestamp> <type> <payload>"`.
#[must_use]
pub fn format_entry(entry: &LedgerEntry) -> String {
    format!("{} {} {}", entry.timestamp.to_rfc3339(), entry.entry_type, entry.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct InMemoryLedger {
        entries: Mutex<Vec<LedgerEntry>>,
    }

    #[async_trait]
    impl EventLedger for InMemoryLedger {
        async fn append(&self, _run_id: &str, entry: LedgerEntry) -> DomainResult<()> {
            self.entries.lock().await.push(entry);
            Ok(())
        }
        async fn read_all(&self, _run_id: &str) -> DomainResult<Vec<LedgerEntry>> {
            Ok(self.entries.lock().await.clone())
        }
    }

    #[tokio::test]
    async fn tail_filtered_keeps_only_matching_types() {
        let ledger = Arc::new(InMemoryLedger { entries: Mutex::new(Vec::new()) });
        ledger.append("run-1", LedgerEntry::new("worker-spawned", json!({}))).await.unwrap();
        ledger.append("run-1", LedgerEntry::new("worker-failed", json!({}))).await.unwrap();

        let reader = LedgerReader::new(ledger);
        let filtered = reader.tail_filtered("run-1", &["worker-failed"]).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].entry_type, "worker-failed");
    }

    #[test]
    fn format_entry_includes_type_and_payload() {
        let entry = LedgerEntry::new("phase-completed", json!({"phaseNumber": 1}));
        let line = format_entry(&entry);
        assert!(line.contains("phase-completed"));
        assert!(line.contains("phaseNumber"));
    }
}
