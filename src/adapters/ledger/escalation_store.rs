//! Atomically-rewritten `escalations.json` document, the single
//! human-owned collection named in `spec.md` §6's persisted-state layout.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::DomainResult;
use crate::domain::models::Escalation;
use crate::domain::ports::EscalationStore;

/// Whole-document store: every escalation lives in one JSON file, rewritten
/// atomically on every mutation. Reasonable at the scale `spec.md` expects
/// (human review queue, not a hot path).
pub struct FileEscalationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileEscalationStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { path: root.join("escalations.json"), lock: Mutex::new(()) }
    }

    async fn read_document(&self) -> DomainResult<HashMap<String, Escalation>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_document(&self, document: &HashMap<String, Escalation>) -> DomainResult<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let contents = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl EscalationStore for FileEscalationStore {
    async fn create(&self, escalation: Escalation) -> DomainResult<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(escalation.id.clone(), escalation);
        self.write_document(&document).await
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Escalation>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_document().await?.remove(id))
    }

    async fn update(&self, escalation: Escalation) -> DomainResult<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(escalation.id.clone(), escalation);
        self.write_document(&document).await
    }

    async fn list_open(&self) -> DomainResult<Vec<Escalation>> {
        let _guard = self.lock.lock().await;
        let document = self.read_document().await?;
        let mut open: Vec<Escalation> = document
            .into_values()
            .filter(|e| e.status == crate::domain::models::EscalationStatus::Open)
            .collect();
        open.sort_by_key(|e| e.created_at);
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEscalationStore::new(dir.path().to_path_buf());
        store.create(Escalation::new("esc-1", "reviewer escalated")).await.unwrap();

        let loaded = store.get("esc-1").await.unwrap().unwrap();
        assert_eq!(loaded.reason, "reviewer escalated");
    }

    #[tokio::test]
    async fn list_open_excludes_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEscalationStore::new(dir.path().to_path_buf());
        store.create(Escalation::new("esc-1", "one")).await.unwrap();

        let mut resolved = Escalation::new("esc-2", "two");
        resolved.resolve("human", "fixed manually");
        store.create(resolved).await.unwrap();

        let open = store.list_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "esc-1");
    }

    #[tokio::test]
    async fn update_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileEscalationStore::new(dir.path().to_path_buf());
        store.create(Escalation::new("esc-1", "one")).await.unwrap();

        let mut updated = store.get("esc-1").await.unwrap().unwrap();
        updated.dismiss("human");
        store.update(updated).await.unwrap();

        let loaded = store.get("esc-1").await.unwrap().unwrap();
        assert_eq!(loaded.status, crate::domain::models::EscalationStatus::Dismissed);
    }
}
