//! Parallel agent fan-out
//!
//! Launches one task per agent config; all agents run concurrently, each
//! agent is internally sequential. Results come back in input order
//! regardless of completion order.

use crate::ports::agent_provider::{AgentCallbacks, AgentProvider, ExecuteRequest};
use crate::run_controller::{KillHandle, RunController};
use concilium_domain::{AgentConfig, AgentKind, AgentResult, AgentStatus};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::warn;

/// Input for one parallel fan-out.
pub struct RunAgentsInput {
    pub agents: Vec<AgentConfig>,
    pub prompt: String,
    pub images: Vec<PathBuf>,
    pub callbacks: AgentCallbacks,
    pub controller: Arc<RunController>,
    pub providers: Arc<HashMap<AgentKind, Arc<dyn AgentProvider>>>,
}

/// Run all agents concurrently and collect their results in input order.
pub async fn run_agents_parallel(input: RunAgentsInput) -> Vec<AgentResult> {
    let RunAgentsInput {
        agents,
        prompt,
        images,
        callbacks,
        controller,
        providers,
    } = input;

    let mut join_set = JoinSet::new();

    for (index, config) in agents.iter().cloned().enumerate() {
        let prompt = prompt.clone();
        let images = images.clone();
        let callbacks = callbacks.clone();
        let controller = Arc::clone(&controller);
        let providers = Arc::clone(&providers);

        join_set.spawn(async move {
            let result = run_one_agent(config, prompt, images, callbacks, controller, providers).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<AgentResult>> = agents.iter().map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(e) => warn!("Agent task join error: {}", e),
        }
    }

    // A panicked task leaves its slot empty; fill it with a failed result so
    // callers always get one result per input agent.
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| AgentResult::failed(&agents[index], "Agent task failed"))
        })
        .collect()
}

async fn run_one_agent(
    config: AgentConfig,
    prompt: String,
    images: Vec<PathBuf>,
    callbacks: AgentCallbacks,
    controller: Arc<RunController>,
    providers: Arc<HashMap<AgentKind, Arc<dyn AgentProvider>>>,
) -> AgentResult {
    let instance_key = config.instance_key().to_string();

    let Some(provider) = providers.get(&config.id).cloned() else {
        let message = format!("No provider found for agent type \"{}\"", config.id);
        warn!("{}", message);
        (callbacks.on_status)(&instance_key, AgentStatus::Error);
        return AgentResult::failed(&config, message);
    };

    let cancel = controller.child_token();
    let kill_handle = Arc::new(KillHandle::new(cancel.clone()));
    controller.register(&*instance_key, Arc::clone(&kill_handle));

    let mut result = provider
        .execute(ExecuteRequest {
            agent: config,
            prompt,
            images,
            callbacks,
            cancel,
            kill_handle,
        })
        .await;

    // The controller may have cancelled while the provider was unwinding.
    if controller.is_cancelled() {
        result.status = AgentStatus::Cancelled;
    }

    controller.unregister(&instance_key);
    result
}
