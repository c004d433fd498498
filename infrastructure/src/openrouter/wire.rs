//! OpenRouter wire types
//!
//! Request/response shapes for the chat-completions and models endpoints.
//! Catalog pricing arrives as per-token USD strings; we convert to the
//! per-million-token floats the domain works in.

use concilium_domain::{LlmUsage, ModelInfo, ModelPricing};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    pub usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
}

#[derive(Debug, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WireUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl From<WireUsage> for LlmUsage {
    fn from(usage: WireUsage) -> Self {
        LlmUsage::new(usage.prompt_tokens, usage.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
pub struct WireModel {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub context_length: Option<u64>,
    pub pricing: Option<WirePricing>,
}

#[derive(Debug, Deserialize)]
pub struct WirePricing {
    pub prompt: Option<String>,
    pub completion: Option<String>,
}

/// Per-token USD string → per-million-token float.
fn per_million(per_token: Option<&str>) -> Option<f64> {
    let value: f64 = per_token?.trim().parse().ok()?;
    Some(value * 1_000_000.0)
}

impl From<WireModel> for ModelInfo {
    fn from(model: WireModel) -> Self {
        let pricing = model
            .pricing
            .map(|pricing| ModelPricing {
                prompt: per_million(pricing.prompt.as_deref()),
                completion: per_million(pricing.completion.as_deref()),
            })
            .unwrap_or_default();

        ModelInfo {
            name: model.name.unwrap_or_else(|| model.id.clone()),
            id: model.id,
            description: model.description,
            context_length: model.context_length,
            pricing,
        }
    }
}
