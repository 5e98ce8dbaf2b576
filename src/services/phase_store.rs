//! Phase Store (C4): flat-file persistence for `Phase` records, one file
//! per `(run_id, phase_number)` under `phases/<runId>-<phaseNumber>.json`,
//! per `spec.md` §6's persisted-state layout.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::errors::DomainResult;
use crate::domain::models::Phase;
use crate::domain::ports::PhaseStore;

/// Atomically-rewritten JSON-per-phase store rooted at a data directory.
pub struct FilePhaseStore {
    root: PathBuf,
}

impl FilePhaseStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, run_id: &str, phase_number: u32) -> PathBuf {
        self.root.join("phases").join(format!("{run_id}-{phase_number}.json"))
    }

    async fn write_atomic(&self, path: &PathBuf, contents: &[u8]) -> DomainResult<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl PhaseStore for FilePhaseStore {
    async fn save(&self, phase: &Phase) -> DomainResult<()> {
        let path = self.path_for(&phase.run_id, phase.phase_number);
        let contents = serde_json::to_vec_pretty(phase)?;
        self.write_atomic(&path, &contents).await
    }

    async fn load(&self, run_id: &str, phase_number: u32) -> DomainResult<Option<Phase>> {
        let path = self.path_for(run_id, phase_number);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, run_id: &str, phase_number: u32) -> DomainResult<()> {
        let path = self.path_for(run_id, phase_number);
        match tokio::fs::remove_file(&path).await {
            Ok(()) | Err(_) => Ok(()),
        }
    }

    async fn list_run(&self, run_id: &str) -> DomainResult<Vec<Phase>> {
        let dir = self.root.join("phases");
        let mut phases = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(phases),
            Err(err) => return Err(err.into()),
        };

        let prefix = format!("{run_id}-");
        while let Some(entry) = entries.next_entry().await? {
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else { continue };
            if file_name.starts_with(&prefix) && file_name.ends_with(".json") {
                let bytes = tokio::fs::read(entry.path()).await?;
                phases.push(serde_json::from_slice(&bytes)?);
            }
        }
        phases.sort_by_key(|p: &Phase| p.phase_number);
        Ok(phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Worker;

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePhaseStore::new(dir.path().to_path_buf());
        let phase = Phase::new("run-1", 1, "/repo", "main", vec![Worker::new("w1", "t1")]);

        store.save(&phase).await.unwrap();
        let loaded = store.load("run-1", 1).await.unwrap().unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.workers.len(), 1);
    }

    #[tokio::test]
    async fn load_missing_phase_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePhaseStore::new(dir.path().to_path_buf());
        assert!(store.load("nope", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_run_only_returns_matching_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePhaseStore::new(dir.path().to_path_buf());
        store.save(&Phase::new("run-1", 1, "/repo", "main", vec![])).await.unwrap();
        store.save(&Phase::new("run-1", 2, "/repo", "main", vec![])).await.unwrap();
        store.save(&Phase::new("run-2", 1, "/repo", "main", vec![])).await.unwrap();

        let phases = store.list_run("run-1").await.unwrap();
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].phase_number, 1);
        assert_eq!(phases[1].phase_number, 2);
    }
}
