//! OpenRouter LLM gateway
//!
//! Per-call failures are logged and surface as `None` so the pipeline can
//! degrade around a single dead model. The model catalog is cached behind an
//! `RwLock`; refreshes replace it atomically.

use super::sse::{SseEvent, parse_sse_line};
use super::wire::{
    ChatRequest, ChatResponse, ModelsResponse, StreamOptions, WireMessage,
};
use async_trait::async_trait;
use concilium_application::ports::llm_gateway::{
    ChatMessage, ChunkObserver, GatewayError, GatewayResponse, LlmGateway, ParallelHooks,
};
use concilium_application::use_cases::config_service::DEFAULT_API_URL;
use concilium_domain::{LlmUsage, ModelInfo, ModelPricing};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default deadline for non-streaming and streaming calls alike.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Gateway adapter for the OpenRouter chat-completions API.
#[derive(Clone)]
pub struct OpenRouterGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    cache: Arc<RwLock<Option<Vec<ModelInfo>>>>,
}

impl OpenRouterGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    fn chat_request<'a>(
        &self,
        model: &'a str,
        messages: &'a [ChatMessage],
        stream: bool,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            stream: stream.then_some(true),
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn post(&self, url: &str, timeout: Option<Duration>) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
    }

    /// Catalog used when OpenRouter is unreachable: the default council and
    /// chairman with coarse list pricing, enough to keep cost estimates sane.
    fn fallback_models() -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("openai/gpt-5.2", "OpenAI: GPT-5.2")
                .with_pricing(ModelPricing::new(1.75, 14.0)),
            ModelInfo::new("google/gemini-3-pro-preview", "Google: Gemini 3 Pro")
                .with_pricing(ModelPricing::new(2.0, 12.0)),
            ModelInfo::new("anthropic/claude-opus-4.6", "Anthropic: Claude Opus 4.6")
                .with_pricing(ModelPricing::new(5.0, 25.0)),
        ]
    }
}

#[async_trait]
impl LlmGateway for OpenRouterGateway {
    async fn query(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Option<Duration>,
    ) -> Option<GatewayResponse> {
        let body = self.chat_request(model, messages, false);
        let response = match self.post(&self.chat_url(), timeout).json(&body).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!("Query to {} failed: {}", model, error);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("Query to {} returned HTTP {}", model, response.status());
            return None;
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!("Query to {} returned invalid JSON: {}", model, error);
                return None;
            }
        };

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)?;
        Some(GatewayResponse {
            content,
            usage: parsed.usage.map(LlmUsage::from),
        })
    }

    async fn query_streaming(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_chunk: ChunkObserver,
        timeout: Option<Duration>,
    ) -> Option<GatewayResponse> {
        let body = self.chat_request(model, messages, true);
        let response = match self.post(&self.chat_url(), timeout).json(&body).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!("Streaming query to {} failed: {}", model, error);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                "Streaming query to {} returned HTTP {}",
                model,
                response.status()
            );
            return None;
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();
        let mut usage: Option<LlmUsage> = None;
        let mut done = false;

        'read: while let Some(bytes) = stream.next().await {
            let bytes = match bytes {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!("Stream from {} broke mid-read: {}", model, error);
                    return None;
                }
            };
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].to_string();
                buffer.drain(..=newline);
                for event in parse_sse_line(&line) {
                    match event {
                        SseEvent::Chunk(chunk) => {
                            on_chunk(&chunk);
                            content.push_str(&chunk);
                        }
                        SseEvent::Usage(u) => usage = Some(u),
                        SseEvent::Done => {
                            done = true;
                            break 'read;
                        }
                    }
                }
            }
        }

        if !done {
            debug!("Stream from {} ended without [DONE]", model);
        }
        if content.is_empty() {
            warn!("Streaming query to {} produced no content", model);
            return None;
        }
        Some(GatewayResponse { content, usage })
    }

    async fn query_models_parallel_streaming(
        &self,
        models: &[String],
        messages: &[ChatMessage],
        hooks: ParallelHooks,
    ) -> HashMap<String, Option<GatewayResponse>> {
        let mut join_set = JoinSet::new();

        for model in models {
            let gateway = self.clone();
            let model = model.clone();
            let messages = messages.to_vec();
            let hooks = hooks.clone();

            join_set.spawn(async move {
                hooks.started(&model);

                let chunk_hooks = hooks.clone();
                let chunk_model = model.clone();
                let observer: ChunkObserver = Arc::new(move |chunk: &str| {
                    chunk_hooks.chunk(&chunk_model, chunk);
                });

                let result = gateway
                    .query_streaming(&model, &messages, observer, None)
                    .await;

                match &result {
                    Some(response) => hooks.completed(&model, true, response.usage.as_ref()),
                    None => hooks.completed(&model, false, None),
                }
                (model, result)
            });
        }

        let mut results: HashMap<String, Option<GatewayResponse>> = models
            .iter()
            .map(|model| (model.clone(), None))
            .collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((model, result)) => {
                    results.insert(model, result);
                }
                Err(error) => warn!("Juror task join error: {}", error),
            }
        }
        results
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let response = self
            .client
            .get(self.models_url())
            .bearer_auth(&self.api_key)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|error| GatewayError::ConnectionError(error.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::RequestFailed(format!(
                "models endpoint returned HTTP {}",
                response.status()
            )));
        }

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|error| GatewayError::InvalidResponse(error.to_string()))?;
        Ok(parsed.data.into_iter().map(ModelInfo::from).collect())
    }

    async fn cached_or_fallback_models(&self) -> Vec<ModelInfo> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            return cached.clone();
        }

        match self.fetch_models().await {
            Ok(models) => {
                let mut cache = self.cache.write().await;
                *cache = Some(models.clone());
                models
            }
            Err(error) => {
                warn!("Model catalog fetch failed, using fallback: {}", error);
                Self::fallback_models()
            }
        }
    }

    async fn clear_model_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}
