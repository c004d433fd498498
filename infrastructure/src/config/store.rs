//! TOML preference store
//!
//! Preferences live in `{config_dir}/concilium/config.toml`. Loading merges
//! the file over defaults via figment, so missing fields and a missing file
//! both resolve cleanly.

use async_trait::async_trait;
use concilium_application::ports::config_store::{ConfigError, ConfigStore, Preferences};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// File-backed [`ConfigStore`].
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/concilium/config.toml` (or the OS equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("concilium").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for TomlConfigStore {
    async fn load(&self) -> Result<Preferences, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Preferences::default()));
        if self.path.exists() {
            figment = figment.merge(Toml::file(&self.path));
        }
        figment
            .extract()
            .map_err(|error| ConfigError::Invalid(error.to_string()))
    }

    async fn save(&self, preferences: &Preferences) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| ConfigError::Io(error.to_string()))?;
        }
        let content =
            toml::to_string_pretty(preferences).map_err(|error| ConfigError::Invalid(error.to_string()))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|error| ConfigError::Io(error.to_string()))
    }
}
