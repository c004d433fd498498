//! Council configuration resolution
//!
//! Precedence, highest first: process environment, stored user preferences
//! (with the API key decrypted through the secret store), built-in defaults.

use crate::ports::config_store::{ConfigError, ConfigStore, Preferences};
use crate::ports::secret_store::SecretStore;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_CHAIRMAN_MODEL: &str = "google/gemini-3-pro-preview";

/// Default council: one frontier model per major vendor.
pub fn default_council_models() -> Vec<String> {
    vec![
        "openai/gpt-5.2".to_string(),
        "google/gemini-3-pro-preview".to_string(),
        "anthropic/claude-opus-4.6".to_string(),
    ]
}

/// Fully resolved council settings for one run.
#[derive(Debug, Clone)]
pub struct CouncilSettings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub council_models: Vec<String>,
    pub chairman_model: String,
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolves council settings and persists preference changes.
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    secrets: Arc<dyn SecretStore>,
    env: EnvLookup,
}

impl ConfigService {
    pub fn new(store: Arc<dyn ConfigStore>, secrets: Arc<dyn SecretStore>) -> Self {
        Self::with_environment(store, secrets, |key| std::env::var(key).ok())
    }

    /// Inject the environment lookup; tests use this to avoid process-global
    /// env mutation.
    pub fn with_environment(
        store: Arc<dyn ConfigStore>,
        secrets: Arc<dyn SecretStore>,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            secrets,
            env: Box::new(env),
        }
    }

    fn env_value(&self, key: &str) -> Option<String> {
        (self.env)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Resolve settings. Never fails: unreadable preferences or undecryptable
    /// keys degrade with a warning.
    pub async fn resolve(&self) -> CouncilSettings {
        let preferences = match self.store.load().await {
            Ok(preferences) => preferences,
            Err(error) => {
                warn!("Could not load preferences, using defaults: {}", error);
                Preferences::default()
            }
        };

        let api_key = self.env_value("OPENROUTER_API_KEY").or_else(|| {
            let encrypted = preferences.encrypted_api_key.as_deref()?;
            match self.secrets.decrypt(encrypted) {
                Ok(key) => Some(key),
                Err(error) => {
                    warn!("Could not decrypt stored API key: {}", error);
                    None
                }
            }
        });

        let council_models = self
            .env_value("COUNCIL_MODELS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|model| !model.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|models| !models.is_empty())
            .or_else(|| {
                preferences
                    .council_models
                    .clone()
                    .filter(|models| !models.is_empty())
            })
            .unwrap_or_else(default_council_models);

        let chairman_model = self
            .env_value("CHAIRMAN_MODEL")
            .or_else(|| preferences.chairman_model.clone())
            .unwrap_or_else(|| DEFAULT_CHAIRMAN_MODEL.to_string());

        let api_url = self
            .env_value("OPENROUTER_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        CouncilSettings {
            api_key,
            api_url,
            council_models,
            chairman_model,
        }
    }

    /// Encrypt and persist the API key.
    pub async fn save_api_key(&self, api_key: &str) -> Result<(), ConfigError> {
        let encrypted = self
            .secrets
            .encrypt(api_key)
            .map_err(|error| ConfigError::Secret(error.to_string()))?;
        let mut preferences = self.store.load().await.unwrap_or_default();
        preferences.encrypted_api_key = Some(encrypted);
        self.store.save(&preferences).await
    }

    /// Persist council preferences; each field updates independently.
    pub async fn save_council_config(
        &self,
        chairman_model: Option<String>,
        council_models: Option<Vec<String>>,
        api_key: Option<&str>,
    ) -> Result<(), ConfigError> {
        let mut preferences = self.store.load().await.unwrap_or_default();
        if let Some(chairman) = chairman_model {
            preferences.chairman_model = Some(chairman);
        }
        if let Some(models) = council_models {
            preferences.council_models = Some(models);
        }
        if let Some(api_key) = api_key {
            preferences.encrypted_api_key = Some(
                self.secrets
                    .encrypt(api_key)
                    .map_err(|error| ConfigError::Secret(error.to_string()))?,
            );
        }
        self.store.save(&preferences).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryConfigStore, PlainSecretStore};

    fn service_with_env(
        store: Arc<MemoryConfigStore>,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> ConfigService {
        ConfigService::with_environment(store, Arc::new(PlainSecretStore), env)
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_configured() {
        let service = service_with_env(Arc::new(MemoryConfigStore::default()), |_| None);
        let settings = service.resolve().await;

        assert!(settings.api_key.is_none());
        assert_eq!(settings.api_url, DEFAULT_API_URL);
        assert_eq!(settings.chairman_model, DEFAULT_CHAIRMAN_MODEL);
        assert_eq!(settings.council_models, default_council_models());
    }

    #[tokio::test]
    async fn test_environment_beats_preferences() {
        let store = Arc::new(MemoryConfigStore::default());
        let service = service_with_env(Arc::clone(&store), |key| match key {
            "OPENROUTER_API_KEY" => Some("sk-env".to_string()),
            "COUNCIL_MODELS" => Some("m1, m2 ,m3".to_string()),
            "CHAIRMAN_MODEL" => Some("env-chairman".to_string()),
            _ => None,
        });
        service
            .save_council_config(
                Some("stored-chairman".to_string()),
                Some(vec!["stored-model".to_string()]),
                Some("sk-stored"),
            )
            .await
            .unwrap();

        let settings = service.resolve().await;
        assert_eq!(settings.api_key.as_deref(), Some("sk-env"));
        assert_eq!(settings.chairman_model, "env-chairman");
        assert_eq!(settings.council_models, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_preferences_beat_defaults() {
        let store = Arc::new(MemoryConfigStore::default());
        let service = service_with_env(Arc::clone(&store), |_| None);
        service
            .save_council_config(
                Some("stored-chairman".to_string()),
                Some(vec!["stored-model".to_string()]),
                Some("sk-stored"),
            )
            .await
            .unwrap();

        let settings = service.resolve().await;
        assert_eq!(settings.api_key.as_deref(), Some("sk-stored"));
        assert_eq!(settings.chairman_model, "stored-chairman");
        assert_eq!(settings.council_models, vec!["stored-model"]);
    }

    #[tokio::test]
    async fn test_save_api_key_roundtrip() {
        let store = Arc::new(MemoryConfigStore::default());
        let service = service_with_env(Arc::clone(&store), |_| None);
        service.save_api_key("sk-secret").await.unwrap();

        // Stored form is the secret store's output, not the plaintext field.
        let stored = store.load().await.unwrap();
        assert!(stored.encrypted_api_key.is_some());

        let settings = service.resolve().await;
        assert_eq!(settings.api_key.as_deref(), Some("sk-secret"));
    }

    #[tokio::test]
    async fn test_blank_env_values_ignored() {
        let service = service_with_env(Arc::new(MemoryConfigStore::default()), |key| {
            (key == "OPENROUTER_API_KEY").then(|| "   ".to_string())
        });
        let settings = service.resolve().await;
        assert!(settings.api_key.is_none());
    }

    #[tokio::test]
    async fn test_save_council_config_updates_fields_independently() {
        let store = Arc::new(MemoryConfigStore::default());
        let service = service_with_env(Arc::clone(&store), |_| None);
        service
            .save_council_config(Some("c1".to_string()), None, None)
            .await
            .unwrap();
        service
            .save_council_config(None, Some(vec!["m1".to_string()]), None)
            .await
            .unwrap();

        let stored = store.load().await.unwrap();
        assert_eq!(stored.chairman_model.as_deref(), Some("c1"));
        assert_eq!(stored.council_models, Some(vec!["m1".to_string()]));
    }
}
