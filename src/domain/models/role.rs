//! Role configuration.
//!
//! A role is a declarative identifier for the kind of agent to spawn
//! (`builder`, `reviewer`, `security-reviewer`, `designer`, `fixer`,
//! `conflict-resolver`), carrying its own prompt template reference and
//! dispatch defaults, loaded from the project's `roles.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dispatch defaults and prompt source for one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub name: String,
    /// Path (relative to the project's `prompts/` directory) to this
    /// role's prompt template.
    pub prompt_template: String,
    pub model: Option<String>,
    pub thinking: Option<String>,
    #[serde(default = "RoleConfig::default_cleanup")]
    pub cleanup: String,
}

impl RoleConfig {
    fn default_cleanup() -> String {
        "delete".to_string()
    }

    #[must_use]
    pub fn new(name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            model: None,
            thinking: None,
            cleanup: Self::default_cleanup(),
        }
    }
}

/// The project's role -> configuration map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRegistry {
    roles: HashMap<String, RoleConfig>,
}

impl RoleRegistry {
    #[must_use]
    pub fn new(roles: Vec<RoleConfig>) -> Self {
        Self { roles: roles.into_iter().map(|r| (r.name.clone(), r)).collect() }
    }

    #[must_use]
    pub fn get(&self, role: &str) -> Option<&RoleConfig> {
        self.roles.get(role)
    }
}
