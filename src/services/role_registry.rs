//! Loads the project's `roles.json` into a [`RoleRegistry`].

use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RoleConfig, RoleRegistry};

/// Read and parse `roles.json` at `path`. Missing file yields an empty
/// registry: callers fall back to [`RoleConfig`]-less defaults per role.
pub async fn load(path: &Path) -> DomainResult<RoleRegistry> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let roles: Vec<RoleConfig> = serde_json::from_slice(&bytes)?;
            Ok(RoleRegistry::new(roles))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(RoleRegistry::default()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_roles_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.json");
        tokio::fs::write(
            &path,
            r#"[{"name": "reviewer", "prompt_template": "reviewer.md", "model": null, "thinking": null, "cleanup": "keep"}]"#,
        )
        .await
        .unwrap();

        let registry = load(&path).await.unwrap();
        let role = registry.get("reviewer").unwrap();
        assert_eq!(role.prompt_template, "reviewer.md");
    }

    #[tokio::test]
    async fn missing_file_yields_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load(&dir.path().join("nope.json")).await.unwrap();
        assert!(registry.get("reviewer").is_none());
    }
}
