//! LLM Gateway port
//!
//! Defines the interface for communicating with remote LLM endpoints.
//! Per-model failures surface as `None`; the pipeline degrades around them.

use async_trait::async_trait;
use concilium_domain::{LlmUsage, ModelInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of a chat request
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completed model response
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub content: String,
    pub usage: Option<LlmUsage>,
}

/// Callback invoked for each streamed text chunk
pub type ChunkObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Per-model lifecycle hooks for the parallel streaming operation.
///
/// `on_complete` is invoked exactly once per requested model, with
/// `success = false` when that model's call failed.
#[derive(Clone, Default)]
pub struct ParallelHooks {
    pub on_start: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_chunk: Option<Arc<dyn Fn(&str, &str) + Send + Sync>>,
    pub on_complete: Option<Arc<dyn Fn(&str, bool, Option<&LlmUsage>) + Send + Sync>>,
}

impl ParallelHooks {
    pub fn started(&self, model: &str) {
        if let Some(hook) = &self.on_start {
            hook(model);
        }
    }

    pub fn chunk(&self, model: &str, chunk: &str) {
        if let Some(hook) = &self.on_chunk {
            hook(model, chunk);
        }
    }

    pub fn completed(&self, model: &str, success: bool, usage: Option<&LlmUsage>) {
        if let Some(hook) = &self.on_complete {
            hook(model, success, usage);
        }
    }
}

/// Gateway for remote LLM communication
///
/// This port defines how the pipeline talks to juror and chairman models.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Single blocking query. `None` on any failure.
    async fn query(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Option<Duration>,
    ) -> Option<GatewayResponse>;

    /// Streaming query delivering text chunks as they arrive.
    async fn query_streaming(
        &self,
        model: &str,
        messages: &[ChatMessage],
        on_chunk: ChunkObserver,
        timeout: Option<Duration>,
    ) -> Option<GatewayResponse>;

    /// Query several models concurrently with interleaved streaming.
    ///
    /// The result map contains one entry per requested model.
    async fn query_models_parallel_streaming(
        &self,
        models: &[String],
        messages: &[ChatMessage],
        hooks: ParallelHooks,
    ) -> HashMap<String, Option<GatewayResponse>>;

    /// Fetch the remote model catalog.
    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;

    /// Cached catalog, refreshing or falling back to a built-in table.
    async fn cached_or_fallback_models(&self) -> Vec<ModelInfo>;

    /// Drop the cached catalog so the next read refetches.
    async fn clear_model_cache(&self);
}
