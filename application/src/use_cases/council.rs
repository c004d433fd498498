//! Council stages: parallel ranking and chairman synthesis
//!
//! Stage 2 fans the anonymized stage-1 answers out to the council models and
//! aggregates their rankings; stage 3 asks the chairman for the final
//! synthesis. Every failure degrades: missing key and thin stage-1 input
//! short-circuit, failed jurors become notes, a dead council falls back to
//! the best available plan.

use crate::ports::event_sink::{EventSink, JurorStatus};
use crate::ports::llm_gateway::{ChatMessage, LlmGateway, ParallelHooks};
use chrono::{DateTime, Utc};
use concilium_domain::{
    AgentConfig, AgentResult, ModelInfo, ModelSnapshot, RunMetadata, SpeedTier, Stage1Result,
    Stage2Result, Stage3Result, aggregate_rankings, estimate_cost, find_model, parse_ranking,
    ranking_prompt, synthesis_prompt,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Hard deadline for the chairman synthesis call.
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(180);

/// Stage-3 model name used when no API key is configured.
const CHAIRMAN_UNAVAILABLE: &str = "chairman-unavailable";

/// Council configuration resolved at run start.
#[derive(Debug, Clone)]
pub struct CouncilConfig {
    pub api_key: Option<String>,
    pub council_models: Vec<String>,
    pub chairman_model: String,
}

/// Everything the council stages produced.
pub struct CouncilOutcome {
    pub stage2: Vec<Stage2Result>,
    pub stage3: Stage3Result,
    pub metadata: RunMetadata,
}

/// Use case for running stages 2 and 3 against the LLM gateway.
pub struct RunCouncilUseCase {
    gateway: Arc<dyn LlmGateway>,
}

impl RunCouncilUseCase {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self { gateway }
    }

    /// Execute the council stages. Infallible by design: every failure mode
    /// maps to a degraded outcome plus notes.
    pub async fn execute(
        &self,
        config: &CouncilConfig,
        user_prompt: &str,
        stage1: &[Stage1Result],
        sink: &Arc<dyn EventSink>,
        on_synthesis_start: &(dyn Fn() + Send + Sync),
    ) -> CouncilOutcome {
        let mut metadata = RunMetadata::default();

        if config.api_key.as_deref().is_none_or(str::is_empty) {
            metadata.push_note("OPENROUTER_API_KEY is missing, Stage 2 and Stage 3 were skipped.");
            let stage3 = Stage3Result::synthetic(
                CHAIRMAN_UNAVAILABLE,
                "Stage 2/3 are unavailable without an OpenRouter API key. \
                 Configure OPENROUTER_API_KEY to enable ranking and synthesis.",
            );
            return CouncilOutcome {
                stage2: Vec::new(),
                stage3,
                metadata,
            };
        }

        if stage1.len() < 2 {
            metadata.push_note("Fewer than two Stage 1 results, ranking skipped.");
            let response = stage1
                .first()
                .map(|result| result.response.clone())
                .unwrap_or_else(|| "Insufficient Stage 1 outputs to run the council.".to_string());
            let stage3 = Stage3Result::synthetic(&config.chairman_model, response);
            return CouncilOutcome {
                stage2: Vec::new(),
                stage3,
                metadata,
            };
        }

        let (prompt, label_to_model) = ranking_prompt(user_prompt, stage1);
        metadata.label_to_model = label_to_model.clone();

        let stage2 = self
            .run_ranking_stage(config, &prompt, sink, &mut metadata)
            .await;
        metadata.aggregate_rankings = aggregate_rankings(&stage2, &label_to_model);

        if stage2.is_empty() {
            metadata.push_note("All ranking models failed; Stage 3 fell back to the first Stage 1 plan.");
            let response = format!(
                "All Stage 2 ranking calls failed. Showing first Stage 1 plan as degraded fallback:\n\n{}",
                stage1[0].response
            );
            let stage3 = Stage3Result::synthetic(&config.chairman_model, response);
            return CouncilOutcome {
                stage2,
                stage3,
                metadata,
            };
        }

        on_synthesis_start();
        let stage3 = self
            .run_synthesis_stage(config, user_prompt, stage1, &stage2)
            .await;

        CouncilOutcome {
            stage2,
            stage3,
            metadata,
        }
    }

    /// Stage 2: every council model ranks the anonymized answers in parallel.
    async fn run_ranking_stage(
        &self,
        config: &CouncilConfig,
        ranking_prompt: &str,
        sink: &Arc<dyn EventSink>,
        metadata: &mut RunMetadata,
    ) -> Vec<Stage2Result> {
        info!("Stage 2: {} council models ranking", config.council_models.len());

        let started: Arc<Mutex<HashMap<String, DateTime<Utc>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let ended: Arc<Mutex<HashMap<String, DateTime<Utc>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let hooks = {
            let started = Arc::clone(&started);
            let ended = Arc::clone(&ended);
            let start_sink = Arc::clone(sink);
            let chunk_sink = Arc::clone(sink);
            let complete_sink = Arc::clone(sink);
            ParallelHooks {
                on_start: Some(Arc::new(move |model: &str| {
                    if let Ok(mut times) = started.lock() {
                        times.insert(model.to_string(), Utc::now());
                    }
                    start_sink.on_juror_status(model, JurorStatus::Evaluating);
                })),
                on_chunk: Some(Arc::new(move |model: &str, chunk: &str| {
                    chunk_sink.on_juror_chunk(model, chunk);
                })),
                on_complete: Some(Arc::new(move |model: &str, success, usage| {
                    if let Ok(mut times) = ended.lock() {
                        times.insert(model.to_string(), Utc::now());
                    }
                    complete_sink.on_juror_complete(model, success, usage);
                    let status = if success {
                        JurorStatus::Complete
                    } else {
                        JurorStatus::Failed
                    };
                    complete_sink.on_juror_status(model, status);
                })),
            }
        };

        let messages = [ChatMessage::user(ranking_prompt)];
        let responses = self
            .gateway
            .query_models_parallel_streaming(&config.council_models, &messages, hooks)
            .await;
        let catalog = self.gateway.cached_or_fallback_models().await;

        let started = started.lock().map(|t| t.clone()).unwrap_or_default();
        let ended = ended.lock().map(|t| t.clone()).unwrap_or_default();

        let mut stage2 = Vec::new();
        for model in &config.council_models {
            let Some(response) = responses.get(model).and_then(Option::as_ref) else {
                warn!("Ranking model failed: {}", model);
                metadata.push_note(format!("Ranking model failed: {model}"));
                continue;
            };

            let estimated_cost = response.usage.as_ref().and_then(|usage| {
                find_model(&catalog, model).and_then(|info| estimate_cost(usage, &info.pricing))
            });

            stage2.push(Stage2Result {
                model: model.clone(),
                ranking: response.content.clone(),
                parsed_ranking: parse_ranking(&response.content),
                usage: response.usage,
                started_at: started.get(model).copied().unwrap_or_else(Utc::now),
                ended_at: ended.get(model).copied().unwrap_or_else(Utc::now),
                estimated_cost,
            });
        }
        stage2
    }

    /// Stage 3: a single blocking synthesis call to the chairman.
    async fn run_synthesis_stage(
        &self,
        config: &CouncilConfig,
        user_prompt: &str,
        stage1: &[Stage1Result],
        stage2: &[Stage2Result],
    ) -> Stage3Result {
        info!("Stage 3: chairman {} synthesizing", config.chairman_model);

        let prompt = synthesis_prompt(user_prompt, stage1, stage2);
        let messages = [ChatMessage::user(prompt)];

        let chairman_started_at = Utc::now();
        let response = self
            .gateway
            .query(&config.chairman_model, &messages, Some(SYNTHESIS_TIMEOUT))
            .await;
        let chairman_ended_at = Utc::now();

        match response {
            Some(response) => {
                let catalog = self.gateway.cached_or_fallback_models().await;
                let estimated_cost = response.usage.as_ref().and_then(|usage| {
                    find_model(&catalog, &config.chairman_model)
                        .and_then(|info| estimate_cost(usage, &info.pricing))
                });
                Stage3Result {
                    model: config.chairman_model.clone(),
                    response: response.content,
                    usage: response.usage,
                    started_at: Some(chairman_started_at),
                    ended_at: Some(chairman_ended_at),
                    estimated_cost,
                }
            }
            None => {
                warn!("Chairman model {} returned no response", config.chairman_model);
                Stage3Result {
                    model: config.chairman_model.clone(),
                    response: "Error: Unable to generate final synthesis from chairman model."
                        .to_string(),
                    usage: None,
                    started_at: Some(chairman_started_at),
                    ended_at: Some(chairman_ended_at),
                    estimated_cost: None,
                }
            }
        }
    }
}

/// Snapshot each successful agent's model: pricing midpoint per 1k tokens,
/// wall-clock latency and a coarse speed tier. Keyed by display name.
pub fn build_model_snapshots(
    configs: &[AgentConfig],
    agents: &[AgentResult],
    catalog: &[ModelInfo],
) -> Option<BTreeMap<String, ModelSnapshot>> {
    let mut snapshots = BTreeMap::new();

    for agent in agents.iter().filter(|agent| agent.is_success()) {
        let Some(config) = configs
            .iter()
            .find(|config| config.instance_id == agent.instance_id)
        else {
            continue;
        };

        let cost_per_1k_tokens =
            find_model(catalog, &config.model).and_then(|info| info.pricing.midpoint_per_1k());
        let latency_ms = (agent.ended_at - agent.started_at).num_milliseconds();

        snapshots.insert(
            agent.display_name.clone(),
            ModelSnapshot {
                model_id: config.model.clone(),
                provider: config.id.to_string(),
                cost_per_1k_tokens,
                latency_ms,
                speed_tier: SpeedTier::from_latency_ms(latency_ms),
            },
        );
    }

    (!snapshots.is_empty()).then_some(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockGateway, RecordingSink, SinkEvent};
    use concilium_domain::{LlmUsage, ModelPricing};

    fn config(models: &[&str]) -> CouncilConfig {
        CouncilConfig {
            api_key: Some("sk-test".to_string()),
            council_models: models.iter().map(|m| m.to_string()).collect(),
            chairman_model: "google/gemini-3-pro-preview".to_string(),
        }
    }

    fn stage1_two() -> Vec<Stage1Result> {
        vec![
            Stage1Result::new("opencode · a", "A"),
            Stage1Result::new("opencode · b", "B"),
        ]
    }

    fn sink() -> (Arc<dyn EventSink>, Arc<RecordingSink>) {
        let recording = Arc::new(RecordingSink::new());
        (recording.clone() as Arc<dyn EventSink>, recording)
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_council() {
        let gateway = Arc::new(MockGateway::new());
        let use_case = RunCouncilUseCase::new(gateway);
        let mut config = config(&["j1"]);
        config.api_key = None;
        let (sink, _) = sink();

        let outcome = use_case
            .execute(&config, "q", &stage1_two(), &sink, &|| {})
            .await;

        assert!(outcome.stage2.is_empty());
        assert_eq!(outcome.stage3.model, "chairman-unavailable");
        assert!(
            outcome
                .metadata
                .notes
                .contains(&"OPENROUTER_API_KEY is missing, Stage 2 and Stage 3 were skipped.".to_string())
        );
    }

    #[tokio::test]
    async fn test_single_stage1_result_skips_ranking() {
        let gateway = Arc::new(MockGateway::new());
        let use_case = RunCouncilUseCase::new(gateway);
        let stage1 = vec![Stage1Result::new("opencode · a", "the only plan")];
        let (sink, _) = sink();

        let outcome = use_case
            .execute(&config(&["j1"]), "q", &stage1, &sink, &|| {})
            .await;

        assert!(outcome.stage2.is_empty());
        assert_eq!(outcome.stage3.model, "google/gemini-3-pro-preview");
        assert_eq!(outcome.stage3.response, "the only plan");
    }

    #[tokio::test]
    async fn test_three_jurors_rank_and_chairman_synthesizes() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_response("j1", "FINAL RANKING:\n1. Response A\n2. Response B")
                .with_response("j2", "FINAL RANKING:\n1. Response B\n2. Response A")
                .with_response("j3", "FINAL RANKING:\n1. Response A\n2. Response B")
                .with_response("google/gemini-3-pro-preview", "final synthesis"),
        );
        let use_case = RunCouncilUseCase::new(gateway);
        let (sink, recording) = sink();

        let outcome = use_case
            .execute(&config(&["j1", "j2", "j3"]), "hello", &stage1_two(), &sink, &|| {})
            .await;

        assert_eq!(outcome.stage2.len(), 3);
        let rankings = &outcome.metadata.aggregate_rankings;
        assert_eq!(rankings[0].model, "opencode · a");
        assert_eq!(rankings[0].average_rank, 1.33);
        assert_eq!(rankings[0].rankings_count, 3);
        assert_eq!(outcome.stage3.response, "final synthesis");

        // Each juror completed exactly once.
        let completes = recording
            .events()
            .iter()
            .filter(|e| matches!(e, SinkEvent::JurorComplete { .. }))
            .count();
        assert_eq!(completes, 3);
    }

    #[tokio::test]
    async fn test_failed_juror_becomes_note() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_response("j1", "FINAL RANKING:\n1. Response A\n2. Response B")
                .with_failure("j2")
                .with_response("google/gemini-3-pro-preview", "final"),
        );
        let use_case = RunCouncilUseCase::new(gateway);
        let (sink, _) = sink();

        let outcome = use_case
            .execute(&config(&["j1", "j2"]), "q", &stage1_two(), &sink, &|| {})
            .await;

        assert_eq!(outcome.stage2.len(), 1);
        assert!(
            outcome
                .metadata
                .notes
                .contains(&"Ranking model failed: j2".to_string())
        );
        assert_eq!(outcome.metadata.aggregate_rankings[0].rankings_count, 1);
    }

    #[tokio::test]
    async fn test_all_jurors_failed_degrades_stage3() {
        let gateway = Arc::new(MockGateway::new().with_failure("j1").with_failure("j2"));
        let use_case = RunCouncilUseCase::new(gateway);
        let (sink, _) = sink();

        let outcome = use_case
            .execute(&config(&["j1", "j2"]), "q", &stage1_two(), &sink, &|| {})
            .await;

        assert!(outcome.stage2.is_empty());
        assert!(outcome.stage3.response.starts_with(
            "All Stage 2 ranking calls failed. Showing first Stage 1 plan as degraded fallback:\n\n"
        ));
        assert!(outcome.stage3.response.ends_with("A"));
    }

    #[tokio::test]
    async fn test_chairman_null_response_yields_error_text() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_response("j1", "FINAL RANKING:\n1. Response A\n2. Response B")
                .with_response("j2", "FINAL RANKING:\n1. Response A\n2. Response B"),
        );
        let use_case = RunCouncilUseCase::new(gateway);
        let (sink, _) = sink();

        let outcome = use_case
            .execute(&config(&["j1", "j2"]), "q", &stage1_two(), &sink, &|| {})
            .await;

        assert_eq!(
            outcome.stage3.response,
            "Error: Unable to generate final synthesis from chairman model."
        );
        assert!(outcome.stage3.started_at.is_some());
    }

    #[tokio::test]
    async fn test_malformed_juror_contributes_nothing() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_response("j1", "I can't pick a winner here.")
                .with_response("j2", "FINAL RANKING:\n1. Response B\n2. Response A")
                .with_response("google/gemini-3-pro-preview", "final"),
        );
        let use_case = RunCouncilUseCase::new(gateway);
        let (sink, _) = sink();

        let outcome = use_case
            .execute(&config(&["j1", "j2"]), "q", &stage1_two(), &sink, &|| {})
            .await;

        let malformed = outcome.stage2.iter().find(|r| r.model == "j1").unwrap();
        assert!(malformed.parsed_ranking.is_empty());
        for ranking in &outcome.metadata.aggregate_rankings {
            assert_eq!(ranking.rankings_count, 1);
        }
    }

    #[tokio::test]
    async fn test_juror_cost_estimated_from_catalog() {
        let gateway = Arc::new(
            MockGateway::new()
                .with_response_and_usage(
                    "openai/gpt-5.2",
                    "FINAL RANKING:\n1. Response A\n2. Response B",
                    LlmUsage::new(1000, 500),
                )
                .with_response("j2", "FINAL RANKING:\n1. Response A\n2. Response B")
                .with_response("google/gemini-3-pro-preview", "final")
                .with_catalog_entry("openai/gpt-5.2", ModelPricing::new(3.0, 15.0)),
        );
        let use_case = RunCouncilUseCase::new(gateway);
        let (sink, _) = sink();

        let outcome = use_case
            .execute(
                &config(&["openai/gpt-5.2", "j2"]),
                "q",
                &stage1_two(),
                &sink,
                &|| {},
            )
            .await;

        let priced = outcome
            .stage2
            .iter()
            .find(|r| r.model == "openai/gpt-5.2")
            .unwrap();
        assert!((priced.estimated_cost.unwrap() - 0.0105).abs() < 1e-12);
    }

    #[test]
    fn test_build_model_snapshots() {
        use chrono::Duration as ChronoDuration;
        use concilium_domain::{AgentInstance, AgentKind, AgentStatus};

        let instance = AgentInstance::new("i-1", AgentKind::Claude).with_model("anthropic/claude-opus-4.6");
        let config = AgentConfig::from_instance(&instance, "/tmp");
        let mut agent = AgentResult::failed(&config, "");
        agent.status = AgentStatus::Success;
        agent.errors.clear();
        agent.normalized_plan = "plan".to_string();
        agent.ended_at = agent.started_at + ChronoDuration::milliseconds(20_000);

        let catalog = vec![
            ModelInfo::new("anthropic/claude-opus-4.6", "Opus")
                .with_pricing(ModelPricing::new(15.0, 75.0)),
        ];

        let snapshots = build_model_snapshots(&[config.clone()], &[agent], &catalog).unwrap();
        let snapshot = snapshots.get(&config.display_name).unwrap();
        assert_eq!(snapshot.model_id, "anthropic/claude-opus-4.6");
        assert_eq!(snapshot.provider, "claude");
        assert_eq!(snapshot.speed_tier, SpeedTier::Balanced);
        assert_eq!(snapshot.latency_ms, 20_000);
        assert_eq!(snapshot.cost_per_1k_tokens, Some(0.045));
    }

    #[test]
    fn test_snapshots_skip_failed_agents() {
        use concilium_domain::{AgentInstance, AgentKind};
        let instance = AgentInstance::new("i-1", AgentKind::Claude);
        let config = AgentConfig::from_instance(&instance, "/tmp");
        let agent = AgentResult::failed(&config, "boom");
        assert!(build_model_snapshots(&[config], &[agent], &[]).is_none());
    }
}
