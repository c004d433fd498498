//! The deliberation orchestrator
//!
//! Drives the three-stage pipeline for one run: fan agents out, collect the
//! survivors, have the council rank them, let the chairman synthesize, then
//! persist the record. Owns run identity, timing, the cancellation scope
//! and the exactly-one-terminal-event policy.

use crate::ports::agent_provider::{AgentCallbacks, AgentProvider};
use crate::ports::event_sink::EventSink;
use crate::ports::llm_gateway::LlmGateway;
use crate::ports::run_repository::{RepositoryError, RunRepository};
use crate::run_controller::RunController;
use crate::use_cases::config_service::ConfigService;
use crate::use_cases::council::{CouncilConfig, RunCouncilUseCase, build_model_snapshots};
use crate::use_cases::run_agents::{RunAgentsInput, run_agents_parallel};
use chrono::Utc;
use concilium_domain::{
    AgentConfig, AgentInstance, AgentKind, AgentStatus, RunRecord, Stage1Result,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors that terminate a run
#[derive(Error, Debug)]
pub enum DeliberationError {
    #[error("Run cancelled after Stage 1")]
    CancelledAfterStage1,

    #[error("Run cancelled after Stage 2/3")]
    CancelledAfterStage23,

    #[error("All agents failed or were aborted.")]
    NoUsableResults,

    #[error("Failed to persist run record: {0}")]
    Repository(#[from] RepositoryError),
}

/// Input for one deliberation run
#[derive(Debug, Clone)]
pub struct DeliberationRequest {
    pub prompt: String,
    pub images: Vec<PathBuf>,
    pub agent_instances: Vec<AgentInstance>,
    pub working_directory: PathBuf,
}

/// Use case driving the full three-stage pipeline.
///
/// Active runs are tracked in an instance-scoped controller registry so
/// external cancel requests can find them; multiple orchestrators can
/// coexist in one process.
pub struct DeliberationOrchestrator {
    providers: Arc<HashMap<AgentKind, Arc<dyn AgentProvider>>>,
    gateway: Arc<dyn LlmGateway>,
    repository: Arc<dyn RunRepository>,
    sink: Arc<dyn EventSink>,
    config: Arc<ConfigService>,
    controllers: Mutex<HashMap<String, Arc<RunController>>>,
}

impl DeliberationOrchestrator {
    pub fn new(
        providers: HashMap<AgentKind, Arc<dyn AgentProvider>>,
        gateway: Arc<dyn LlmGateway>,
        repository: Arc<dyn RunRepository>,
        sink: Arc<dyn EventSink>,
        config: Arc<ConfigService>,
    ) -> Self {
        Self {
            providers: Arc::new(providers),
            gateway,
            repository,
            sink,
            config,
            controllers: Mutex::new(HashMap::new()),
        }
    }

    /// Run the full pipeline and return the persisted record.
    ///
    /// Exactly one terminal event is emitted: `run:complete` on success,
    /// `run:error` on failure (then the error is re-raised to the caller).
    pub async fn run(&self, request: DeliberationRequest) -> Result<RunRecord, DeliberationError> {
        let run_id = Uuid::new_v4().to_string();
        let controller = Arc::new(RunController::new());
        self.insert_controller(&run_id, Arc::clone(&controller));

        let result = self.run_pipeline(&run_id, &controller, request).await;

        // The controller entry goes away on every exit path; cancel() may
        // already have removed it.
        self.remove_controller(&run_id);

        match result {
            Ok(record) => {
                self.sink.on_run_complete(&record);
                Ok(record)
            }
            Err(error) => {
                self.sink.on_run_error(&error.to_string());
                Err(error)
            }
        }
    }

    async fn run_pipeline(
        &self,
        run_id: &str,
        controller: &Arc<RunController>,
        request: DeliberationRequest,
    ) -> Result<RunRecord, DeliberationError> {
        let settings = self.config.resolve().await;
        let created_at = Utc::now();

        let configs: Vec<AgentConfig> = request
            .agent_instances
            .iter()
            .filter(|instance| instance.enabled)
            .map(|instance| AgentConfig::from_instance(instance, &request.working_directory))
            .collect();

        info!(run_id, agents = configs.len(), "Starting deliberation");
        self.sink.on_stage_change(
            1,
            &format!("Competing — {} agents answering in parallel", configs.len()),
        );
        for config in &configs {
            self.sink.on_agent_status(
                config.instance_key(),
                AgentStatus::Queued,
                Some(&config.display_name),
            );
        }

        let status_sink = Arc::clone(&self.sink);
        let event_sink = Arc::clone(&self.sink);
        let callbacks = AgentCallbacks::new(
            Arc::new(move |key, status| status_sink.on_agent_status(key, status, None)),
            Arc::new(move |key, event| event_sink.on_agent_event(key, event)),
        );

        let agents = run_agents_parallel(RunAgentsInput {
            agents: configs.clone(),
            prompt: request.prompt.clone(),
            images: request.images.clone(),
            callbacks,
            controller: Arc::clone(controller),
            providers: Arc::clone(&self.providers),
        })
        .await;

        if controller.is_cancelled() {
            return Err(DeliberationError::CancelledAfterStage1);
        }

        let stage1: Vec<Stage1Result> = agents
            .iter()
            .filter(|agent| agent.is_usable())
            .map(|agent| Stage1Result::new(&agent.display_name, &agent.normalized_plan))
            .collect();
        if stage1.is_empty() {
            return Err(DeliberationError::NoUsableResults);
        }

        self.sink.on_stage_change(
            2,
            &format!(
                "Judging — {} council models ranking {} answers",
                settings.council_models.len(),
                stage1.len()
            ),
        );

        let council_config = CouncilConfig {
            api_key: settings.api_key.clone(),
            council_models: settings.council_models.clone(),
            chairman_model: settings.chairman_model.clone(),
        };
        let stage3_sink = Arc::clone(&self.sink);
        let council = RunCouncilUseCase::new(Arc::clone(&self.gateway));
        let outcome = council
            .execute(&council_config, &request.prompt, &stage1, &self.sink, &move || {
                stage3_sink.on_stage_change(3, "Synthesizing — chairman drafting the final answer");
                stage3_sink.on_synthesis_start();
            })
            .await;

        if controller.is_cancelled() {
            return Err(DeliberationError::CancelledAfterStage23);
        }

        let mut metadata = outcome.metadata;
        let catalog = self.gateway.cached_or_fallback_models().await;
        metadata.model_snapshots = build_model_snapshots(&configs, &agents, &catalog);

        let record = RunRecord {
            id: run_id.to_string(),
            created_at,
            prompt: request.prompt,
            working_directory: request.working_directory.display().to_string(),
            selected_agents: configs.iter().map(|config| config.id).collect(),
            agents,
            stage1,
            stage2: outcome.stage2,
            stage3: Some(outcome.stage3),
            metadata,
        };

        self.repository.save(&record).await?;
        info!(run_id, "Deliberation complete");
        Ok(record)
    }

    /// Cancel a run: fires its controller and forgets it.
    pub fn cancel(&self, run_id: &str) {
        if let Some(controller) = self.take_controller(run_id) {
            controller.cancel();
        }
    }

    /// Cancel a single agent of a running run.
    pub fn cancel_agent(&self, run_id: &str, instance_key: &str) -> bool {
        let controller = self
            .controllers
            .lock()
            .ok()
            .and_then(|controllers| controllers.get(run_id).cloned());
        controller
            .map(|controller| controller.cancel_agent(instance_key))
            .unwrap_or(false)
    }

    /// Cancel every active run.
    pub fn cancel_all(&self) {
        let controllers: Vec<Arc<RunController>> = self
            .controllers
            .lock()
            .map(|mut controllers| controllers.drain().map(|(_, c)| c).collect())
            .unwrap_or_default();
        for controller in controllers {
            controller.cancel();
        }
    }

    fn insert_controller(&self, run_id: &str, controller: Arc<RunController>) {
        if let Ok(mut controllers) = self.controllers.lock() {
            controllers.insert(run_id.to_string(), controller);
        }
    }

    fn remove_controller(&self, run_id: &str) {
        if let Ok(mut controllers) = self.controllers.lock() {
            controllers.remove(run_id);
        }
    }

    fn take_controller(&self, run_id: &str) -> Option<Arc<RunController>> {
        self.controllers
            .lock()
            .ok()
            .and_then(|mut controllers| controllers.remove(run_id))
    }
}
