//! JSONL append-only ledger, one file per run under `ledger/<runId>.jsonl`.
//!
//! Entries have no owner once written (per `spec.md` §3's ownership rules),
//! so appends never need the read-modify-write locking `FilePhaseStore`
//! uses — a single `O_APPEND` write per entry is enough, serialized per run
//! by a small lock map matching `PhaseCollector`'s pattern.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::domain::errors::DomainResult;
use crate::domain::models::LedgerEntry;
use crate::domain::ports::EventLedger;

/// Append-only JSONL event stream rooted at a data directory.
pub struct FileEventLedger {
    root: PathBuf,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileEventLedger {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root, locks: RwLock::new(HashMap::new()) }
    }

    fn path_for(&self, run_id: &str) -> PathBuf {
        self.root.join("ledger").join(format!("{run_id}.jsonl"))
    }

    async fn lock_for(&self, run_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(run_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks.entry(run_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[async_trait]
impl EventLedger for FileEventLedger {
    async fn append(&self, run_id: &str, entry: LedgerEntry) -> DomainResult<()> {
        let lock = self.lock_for(run_id).await;
        let _guard = lock.lock().await;

        let path = self.path_for(run_id);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_all(&self, run_id: &str) -> DomainResult<Vec<LedgerEntry>> {
        let path = self.path_for(run_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}
