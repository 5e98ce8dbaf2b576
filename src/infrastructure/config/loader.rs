use std::path::Path;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use super::Config;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("orchestrator_data_dir cannot be empty")]
    EmptyDataDir,
    #[error("projects_dir cannot be empty")]
    EmptyProjectsDir,
    #[error("worktree_dir cannot be empty")]
    EmptyWorktreeDir,
    #[error("invalid port: {0}. Must be nonzero")]
    InvalidPort(u16),
    #[error("gateway_url cannot be empty")]
    EmptyGatewayUrl,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .swarmops/config.yaml (project config)
    /// 3. .swarmops/local.yaml (project local overrides, optional)
    /// 4. Environment variables (highest priority)
    ///
    /// Each env var in `spec.md` §6 maps to a field of its own rather than
    /// sharing a single prefix (`ORCHESTRATOR_DATA_DIR`, `PROJECTS_DIR`,
    /// `DASHBOARD_PATH`, `PORT`, `OPENCLAW_GATEWAY_URL`,
    /// `OPENCLAW_GATEWAY_TOKEN`, `SWARMOPS_WORKTREE_DIR`,
    /// `SWARMOPS_API_TOKEN`), so each is merged individually and renamed to
    /// its struct field.
    pub fn load() -> Result<Config> {
        let config: Config = Self::env_layers(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(".swarmops/config.yaml"))
                .merge(Yaml::file(".swarmops/local.yaml")),
        )
        .extract()
        .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, skipping the project
    /// default/local layers. Used by tests and `--config <path>`.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Self::env_layers(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Yaml::file(path.as_ref())),
        )
        .extract()
        .context(format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn env_layers(figment: Figment) -> Figment {
        figment
            .merge(Env::raw().only(&["ORCHESTRATOR_DATA_DIR"]).map(|_| "orchestrator_data_dir".into()))
            .merge(Env::raw().only(&["PROJECTS_DIR"]).map(|_| "projects_dir".into()))
            .merge(Env::raw().only(&["DASHBOARD_PATH"]).map(|_| "dashboard_path".into()))
            .merge(Env::raw().only(&["PORT"]).map(|_| "port".into()))
            .merge(Env::raw().only(&["OPENCLAW_GATEWAY_URL"]).map(|_| "gateway_url".into()))
            .merge(Env::raw().only(&["OPENCLAW_GATEWAY_TOKEN"]).map(|_| "gateway_token".into()))
            .merge(Env::raw().only(&["SWARMOPS_WORKTREE_DIR"]).map(|_| "worktree_dir".into()))
            .merge(Env::raw().only(&["SWARMOPS_API_TOKEN"]).map(|_| "api_token".into()))
    }

    /// Validate configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.orchestrator_data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if config.projects_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyProjectsDir);
        }
        if config.worktree_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyWorktreeDir);
        }
        if config.port == 0 {
            return Err(ConfigError::InvalidPort(config.port));
        }
        if config.gateway_url.is_empty() {
            return Err(ConfigError::EmptyGatewayUrl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("default config should be valid");
    }

    #[test]
    fn load_from_file_merges_yaml_over_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port: 9000\ngateway_url: http://gateway.internal:8787").unwrap();
        file.flush().unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.gateway_url, "http://gateway.internal:8787");
        assert_eq!(config.projects_dir, Config::default().projects_dir);
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut config = Config::default();
        config.port = 0;
        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::InvalidPort(0))));
    }

    #[test]
    fn validate_rejects_empty_gateway_url() {
        let mut config = Config::default();
        config.gateway_url = String::new();
        let result = ConfigLoader::validate(&config);
        assert!(matches!(result, Err(ConfigError::EmptyGatewayUrl)));
    }

    #[test]
    fn per_field_env_vars_override_without_a_shared_prefix() {
        temp_env::with_vars(
            [("OPENCLAW_GATEWAY_TOKEN", Some("secret-token")), ("PORT", Some("7070"))],
            || {
                let config = ConfigLoader::load_from_file(".swarmops/does-not-exist.yaml").unwrap();
                assert_eq!(config.gateway_token, "secret-token");
                assert_eq!(config.port, 7070);
            },
        );
    }
}
