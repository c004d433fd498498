//! User preference storage port

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during configuration operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Secret error: {0}")]
    Secret(String),
}

/// Stored user preferences; every field is optional and falls through to
/// environment or defaults when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub council_models: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chairman_model: Option<String>,
    /// API key as produced by the secret store, never plaintext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_api_key: Option<String>,
}

/// Port for reading and writing user preferences.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<Preferences, ConfigError>;
    async fn save(&self, preferences: &Preferences) -> Result<(), ConfigError>;
}
