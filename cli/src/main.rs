//! CLI entrypoint for concilium
//!
//! Wires the layers together with dependency injection: file-backed stores,
//! the OpenRouter gateway, the agent provider registry, and a console sink
//! for progress.

use anyhow::{Result, bail};
use clap::Parser;
use concilium_application::{
    ConfigService, DeliberationOrchestrator, DeliberationRequest, EventSink, NullSink,
    RunRepository,
};
use concilium_domain::{AgentInstance, AgentKind, AgentStatus, RunRecord};
use concilium_infrastructure::{
    Base64SecretStore, FileRunRepository, JsonlEventSink, OpenRouterGateway, TomlConfigStore,
    default_providers,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "concilium", about = "Multi-agent deliberation: compete, review, synthesize")]
struct Cli {
    /// The prompt to deliberate on
    prompt: Option<String>,

    /// Agents to run, as `kind` or `kind:model` (repeatable)
    #[arg(short, long)]
    agent: Vec<String>,

    /// Working directory for the agents (defaults to the current directory)
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Persist this chairman model before running
    #[arg(long)]
    chairman: Option<String>,

    /// Persist these council models (comma-separated) before running
    #[arg(long)]
    council: Option<String>,

    /// List stored runs and exit
    #[arg(long)]
    list_runs: bool,

    /// Show a stored run's synthesis and exit
    #[arg(long, value_name = "RUN_ID")]
    show: Option<String>,

    /// Also write the full event stream to a JSONL file
    #[arg(long, value_name = "PATH")]
    log_events: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Minimal console progress: stage banners and agent status lines.
struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn on_stage_change(&self, stage: u8, summary: &str) {
        println!("\n== Stage {stage}: {summary}");
    }

    fn on_agent_status(&self, instance_key: &str, status: AgentStatus, display_name: Option<&str>) {
        match display_name {
            Some(name) => println!("   [{instance_key}] {name}: {status}"),
            None => println!("   [{instance_key}] {status}"),
        }
    }

    fn on_agent_event(&self, _instance_key: &str, _event: &concilium_domain::ParsedEvent) {}

    fn on_juror_status(
        &self,
        model: &str,
        status: concilium_application::JurorStatus,
    ) {
        println!("   juror {model}: {}", status.as_str());
    }

    fn on_run_complete(&self, record: &RunRecord) {
        println!("\nRun {} complete.", record.id);
    }

    fn on_run_error(&self, message: &str) {
        eprintln!("\nRun failed: {message}");
    }
}

/// Fan a sink pair out; the JSONL log rides alongside the console.
struct TeeSink(Vec<Arc<dyn EventSink>>);

impl EventSink for TeeSink {
    fn on_stage_change(&self, stage: u8, summary: &str) {
        self.0.iter().for_each(|s| s.on_stage_change(stage, summary));
    }
    fn on_agent_status(&self, key: &str, status: AgentStatus, display_name: Option<&str>) {
        self.0
            .iter()
            .for_each(|s| s.on_agent_status(key, status, display_name));
    }
    fn on_agent_event(&self, key: &str, event: &concilium_domain::ParsedEvent) {
        self.0.iter().for_each(|s| s.on_agent_event(key, event));
    }
    fn on_juror_status(&self, model: &str, status: concilium_application::JurorStatus) {
        self.0.iter().for_each(|s| s.on_juror_status(model, status));
    }
    fn on_juror_chunk(&self, model: &str, chunk: &str) {
        self.0.iter().for_each(|s| s.on_juror_chunk(model, chunk));
    }
    fn on_juror_complete(
        &self,
        model: &str,
        success: bool,
        usage: Option<&concilium_domain::LlmUsage>,
    ) {
        self.0
            .iter()
            .for_each(|s| s.on_juror_complete(model, success, usage));
    }
    fn on_synthesis_start(&self) {
        self.0.iter().for_each(|s| s.on_synthesis_start());
    }
    fn on_run_complete(&self, record: &RunRecord) {
        self.0.iter().for_each(|s| s.on_run_complete(record));
    }
    fn on_run_error(&self, message: &str) {
        self.0.iter().for_each(|s| s.on_run_error(message));
    }
}

fn parse_agents(specs: &[String]) -> Result<Vec<AgentInstance>> {
    let mut instances = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        let (kind, model) = match spec.split_once(':') {
            Some((kind, model)) => (kind, model),
            None => (spec.as_str(), ""),
        };
        let kind: AgentKind = kind.parse()?;
        instances.push(
            AgentInstance::new(format!("{kind}-{index}"), kind).with_model(model),
        );
    }
    Ok(instances)
}

fn print_record(record: &RunRecord) {
    if !record.metadata.aggregate_rankings.is_empty() {
        println!("\nAggregate rankings:");
        for ranking in &record.metadata.aggregate_rankings {
            println!(
                "  {:<40} avg rank {:.2} ({} jurors)",
                ranking.model, ranking.average_rank, ranking.rankings_count
            );
        }
    }
    if let Some(stage3) = &record.stage3 {
        println!("\n=== Final answer ({}) ===\n", stage3.model);
        println!("{}", stage3.response);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let repository = Arc::new(FileRunRepository::new(FileRunRepository::default_data_dir()));

    if cli.list_runs {
        for summary in repository.list().await? {
            println!(
                "{}  {}  {:<13}  {}",
                summary.id,
                summary.created_at.format("%Y-%m-%d %H:%M"),
                summary.status.as_str(),
                summary.prompt_preview
            );
        }
        return Ok(());
    }

    if let Some(id) = &cli.show {
        let record = repository.load(id).await?;
        print_record(&record);
        return Ok(());
    }

    let Some(prompt) = cli.prompt.clone() else {
        bail!("A prompt is required. See --help.");
    };

    let agents = if cli.agent.is_empty() {
        vec![AgentInstance::new("claude-0", AgentKind::Claude)]
    } else {
        parse_agents(&cli.agent)?
    };

    // === Dependency injection ===
    let config_path = TomlConfigStore::default_path()
        .unwrap_or_else(|| PathBuf::from("concilium.toml"));
    let config = Arc::new(ConfigService::new(
        Arc::new(TomlConfigStore::new(config_path)),
        Arc::new(Base64SecretStore),
    ));

    if cli.chairman.is_some() || cli.council.is_some() {
        let council = cli.council.as_ref().map(|models| {
            models
                .split(',')
                .map(str::trim)
                .filter(|model| !model.is_empty())
                .map(str::to_string)
                .collect()
        });
        config
            .save_council_config(cli.chairman.clone(), council, None)
            .await?;
    }

    let settings = config.resolve().await;
    let gateway = Arc::new(OpenRouterGateway::with_base_url(
        settings.api_key.clone().unwrap_or_default(),
        settings.api_url.clone(),
    ));

    let mut sinks: Vec<Arc<dyn EventSink>> = Vec::new();
    if !cli.quiet {
        sinks.push(Arc::new(ConsoleSink));
    }
    if let Some(path) = &cli.log_events
        && let Some(log) = JsonlEventSink::new(path)
    {
        sinks.push(Arc::new(log));
    }
    let sink: Arc<dyn EventSink> = if sinks.is_empty() {
        Arc::new(NullSink)
    } else {
        Arc::new(TeeSink(sinks))
    };

    let working_directory = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let orchestrator = Arc::new(DeliberationOrchestrator::new(
        default_providers(),
        gateway,
        repository,
        sink,
        config,
    ));

    info!("Starting deliberation with {} agents", agents.len());

    let runner = Arc::clone(&orchestrator);
    let request = DeliberationRequest {
        prompt,
        images: Vec::new(),
        agent_instances: agents,
        working_directory,
    };
    let mut run = tokio::spawn(async move { runner.run(request).await });

    let record = tokio::select! {
        result = &mut run => result??,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted, cancelling agents...");
            orchestrator.cancel_all();
            run.await??
        }
    };

    print_record(&record);
    Ok(())
}
