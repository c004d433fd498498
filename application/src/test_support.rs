//! Shared fakes for use-case tests

use crate::ports::agent_provider::{AgentProvider, ExecuteRequest};
use crate::ports::config_store::{ConfigError, ConfigStore, Preferences};
use crate::ports::event_sink::{EventSink, JurorStatus};
use crate::ports::llm_gateway::{
    ChatMessage, ChunkObserver, GatewayError, GatewayResponse, LlmGateway, ParallelHooks,
};
use crate::ports::run_repository::{RepositoryError, RunRepository};
use crate::ports::secret_store::{SecretError, SecretStore};
use async_trait::async_trait;
use chrono::Utc;
use concilium_domain::{
    AgentKind, AgentResult, AgentStatus, LlmUsage, ModelInfo, ModelPricing, ParsedEvent,
    RunRecord, RunSummary,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

// ==================== MockGateway ====================

/// Gateway fake with scripted per-model responses.
#[derive(Default)]
pub struct MockGateway {
    responses: HashMap<String, Option<(String, Option<LlmUsage>)>>,
    catalog: Vec<ModelInfo>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, model: &str, content: &str) -> Self {
        self.responses
            .insert(model.to_string(), Some((content.to_string(), None)));
        self
    }

    pub fn with_response_and_usage(mut self, model: &str, content: &str, usage: LlmUsage) -> Self {
        self.responses
            .insert(model.to_string(), Some((content.to_string(), Some(usage))));
        self
    }

    pub fn with_failure(mut self, model: &str) -> Self {
        self.responses.insert(model.to_string(), None);
        self
    }

    pub fn with_catalog_entry(mut self, id: &str, pricing: ModelPricing) -> Self {
        self.catalog
            .push(ModelInfo::new(id, id).with_pricing(pricing));
        self
    }

    fn response_for(&self, model: &str) -> Option<GatewayResponse> {
        self.responses
            .get(model)
            .and_then(|scripted| scripted.as_ref())
            .map(|(content, usage)| GatewayResponse {
                content: content.clone(),
                usage: *usage,
            })
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn query(
        &self,
        model: &str,
        _messages: &[ChatMessage],
        _timeout: Option<Duration>,
    ) -> Option<GatewayResponse> {
        self.response_for(model)
    }

    async fn query_streaming(
        &self,
        model: &str,
        _messages: &[ChatMessage],
        on_chunk: ChunkObserver,
        _timeout: Option<Duration>,
    ) -> Option<GatewayResponse> {
        let response = self.response_for(model)?;
        on_chunk(&response.content);
        Some(response)
    }

    async fn query_models_parallel_streaming(
        &self,
        models: &[String],
        _messages: &[ChatMessage],
        hooks: ParallelHooks,
    ) -> HashMap<String, Option<GatewayResponse>> {
        let mut results = HashMap::new();
        for model in models {
            hooks.started(model);
            match self.response_for(model) {
                Some(response) => {
                    hooks.chunk(model, &response.content);
                    hooks.completed(model, true, response.usage.as_ref());
                    results.insert(model.clone(), Some(response));
                }
                None => {
                    hooks.completed(model, false, None);
                    results.insert(model.clone(), None);
                }
            }
        }
        results
    }

    async fn fetch_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        Ok(self.catalog.clone())
    }

    async fn cached_or_fallback_models(&self) -> Vec<ModelInfo> {
        self.catalog.clone()
    }

    async fn clear_model_cache(&self) {}
}

// ==================== RecordingSink ====================

/// Everything a sink can observe, flattened for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    StageChange(u8),
    AgentStatus(String, AgentStatus),
    AgentEvent(String),
    JurorStatus(String, JurorStatus),
    JurorChunk(String),
    JurorComplete { model: String, success: bool },
    SynthesisStart,
    RunComplete,
    RunError(String),
}

/// Sink that records every notification in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventSink for RecordingSink {
    fn on_stage_change(&self, stage: u8, _summary: &str) {
        self.push(SinkEvent::StageChange(stage));
    }

    fn on_agent_status(&self, key: &str, status: AgentStatus, _display_name: Option<&str>) {
        self.push(SinkEvent::AgentStatus(key.to_string(), status));
    }

    fn on_agent_event(&self, key: &str, _event: &ParsedEvent) {
        self.push(SinkEvent::AgentEvent(key.to_string()));
    }

    fn on_juror_status(&self, model: &str, status: JurorStatus) {
        self.push(SinkEvent::JurorStatus(model.to_string(), status));
    }

    fn on_juror_chunk(&self, model: &str, _chunk: &str) {
        self.push(SinkEvent::JurorChunk(model.to_string()));
    }

    fn on_juror_complete(&self, model: &str, success: bool, _usage: Option<&LlmUsage>) {
        self.push(SinkEvent::JurorComplete {
            model: model.to_string(),
            success,
        });
    }

    fn on_synthesis_start(&self) {
        self.push(SinkEvent::SynthesisStart);
    }

    fn on_run_complete(&self, _record: &RunRecord) {
        self.push(SinkEvent::RunComplete);
    }

    fn on_run_error(&self, message: &str) {
        self.push(SinkEvent::RunError(message.to_string()));
    }
}

// ==================== StubProvider ====================

/// Provider fake scripted per instance key.
pub struct StubProvider {
    kind: AgentKind,
    plans: HashMap<String, String>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
}

impl StubProvider {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            plans: HashMap::new(),
            failures: HashMap::new(),
            delays: HashMap::new(),
        }
    }

    pub fn with_plan(mut self, instance_key: &str, plan: &str) -> Self {
        self.plans.insert(instance_key.to_string(), plan.to_string());
        self
    }

    pub fn with_failure(mut self, instance_key: &str, error: &str) -> Self {
        self.failures
            .insert(instance_key.to_string(), error.to_string());
        self
    }

    pub fn with_delay(mut self, instance_key: &str, delay: Duration) -> Self {
        self.delays.insert(instance_key.to_string(), delay);
        self
    }
}

#[async_trait]
impl AgentProvider for StubProvider {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn discover_models(&self) -> Vec<String> {
        Vec::new()
    }

    async fn execute(&self, request: ExecuteRequest) -> AgentResult {
        let key = request.agent.instance_key().to_string();
        let started_at = Utc::now();
        (request.callbacks.on_status)(&key, AgentStatus::Running);

        if let Some(delay) = self.delays.get(&key) {
            tokio::select! {
                _ = request.cancel.cancelled() => {
                    (request.callbacks.on_status)(&key, AgentStatus::Cancelled);
                    let mut result = AgentResult::failed(&request.agent, "cancelled");
                    result.status = AgentStatus::Cancelled;
                    result.errors.clear();
                    result.started_at = started_at;
                    result.ended_at = Utc::now();
                    return result;
                }
                _ = tokio::time::sleep(*delay) => {}
            }
        }

        if let Some(error) = self.failures.get(&key) {
            (request.callbacks.on_status)(&key, AgentStatus::Error);
            return AgentResult::failed(&request.agent, error.clone());
        }

        let plan = self.plans.get(&key).cloned().unwrap_or_default();
        let event = ParsedEvent::text(plan.clone());
        (request.callbacks.on_event)(&key, &event);
        (request.callbacks.on_status)(&key, AgentStatus::Success);

        AgentResult {
            id: request.agent.id,
            instance_id: request.agent.instance_id.clone(),
            display_name: request.agent.display_name.clone(),
            status: AgentStatus::Success,
            started_at,
            ended_at: Utc::now(),
            normalized_plan: plan,
            errors: Vec::new(),
            command: vec!["stub".to_string()],
            events: vec![event],
        }
    }
}

// ==================== MemoryRepository ====================

/// In-memory run store.
#[derive(Default)]
pub struct MemoryRepository {
    records: Mutex<HashMap<String, RunRecord>>,
}

impl MemoryRepository {
    pub fn get(&self, id: &str) -> Option<RunRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl RunRepository for MemoryRepository {
    async fn save(&self, record: &RunRecord) -> Result<PathBuf, RepositoryError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(PathBuf::from(format!("{}.json", record.id)))
    }

    async fn load(&self, id: &str) -> Result<RunRecord, RepositoryError> {
        self.get(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<RunSummary>, RepositoryError> {
        let mut summaries: Vec<RunSummary> = self
            .records
            .lock()
            .unwrap()
            .values()
            .map(RunRecord::summary)
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn load_all(&self) -> Result<Vec<RunRecord>, RepositoryError> {
        let mut records: Vec<RunRecord> = self.records.lock().unwrap().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

// ==================== Config fakes ====================

/// In-memory preference store.
#[derive(Default)]
pub struct MemoryConfigStore {
    preferences: Mutex<Preferences>,
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Preferences, ConfigError> {
        Ok(self.preferences.lock().unwrap().clone())
    }

    async fn save(&self, preferences: &Preferences) -> Result<(), ConfigError> {
        *self.preferences.lock().unwrap() = preferences.clone();
        Ok(())
    }
}

/// Reversible marker "encryption" for tests.
pub struct PlainSecretStore;

impl SecretStore for PlainSecretStore {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        Ok(format!("enc:{plaintext}"))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, SecretError> {
        ciphertext
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| SecretError::Decrypt("missing marker".to_string()))
    }
}
