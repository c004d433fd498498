//! Remote model metadata

use serde::{Deserialize, Serialize};

/// Per-million-token pricing for one remote model.
///
/// Sides are independent; either may be unknown for free or unlisted models.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt: Option<f64>,
    pub completion: Option<f64>,
}

impl ModelPricing {
    pub fn new(prompt: f64, completion: f64) -> Self {
        Self {
            prompt: Some(prompt),
            completion: Some(completion),
        }
    }

    /// Midpoint of both sides expressed per 1k tokens, if both are known.
    pub fn midpoint_per_1k(&self) -> Option<f64> {
        Some((self.prompt? + self.completion?) / 2.0 / 1000.0)
    }
}

/// One entry of the remote model catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: ModelPricing,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            context_length: None,
            pricing: ModelPricing::default(),
        }
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = pricing;
        self
    }
}

/// Find a catalog entry by exact id or suffix match in either direction.
///
/// Agents are often configured with short ids (`claude-opus-4.6`) while the
/// catalog carries vendor-prefixed ones (`anthropic/claude-opus-4.6`).
pub fn find_model<'a>(models: &'a [ModelInfo], id: &str) -> Option<&'a ModelInfo> {
    if id.is_empty() {
        return None;
    }
    models
        .iter()
        .find(|m| m.id == id)
        .or_else(|| {
            models
                .iter()
                .find(|m| m.id.ends_with(id) || id.ends_with(&m.id))
        })
}
