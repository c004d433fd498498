//! Agent provider port
//!
//! One provider per agent kind. A provider spawns its external agent (or
//! opens an SDK session), parses the native streaming protocol into
//! [`ParsedEvent`]s, and returns a normalized [`AgentResult`]. The
//! orchestrator never learns provider-specific shapes.

use crate::run_controller::KillHandle;
use async_trait::async_trait;
use concilium_domain::{AgentConfig, AgentKind, AgentResult, AgentStatus, ParsedEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type StatusCallback = Arc<dyn Fn(&str, AgentStatus) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn(&str, &ParsedEvent) + Send + Sync>;

/// Callbacks a provider invokes while its agent runs.
#[derive(Clone)]
pub struct AgentCallbacks {
    /// `(instance_key, status)` — `Running` at first output, then one terminal
    pub on_status: StatusCallback,
    /// `(instance_key, event)` — in source order for a single agent
    pub on_event: EventCallback,
}

impl AgentCallbacks {
    pub fn new(on_status: StatusCallback, on_event: EventCallback) -> Self {
        Self {
            on_status,
            on_event,
        }
    }

    /// Callbacks that drop everything; useful in tests.
    pub fn noop() -> Self {
        Self {
            on_status: Arc::new(|_, _| {}),
            on_event: Arc::new(|_, _| {}),
        }
    }
}

/// Everything a provider needs to run one agent.
pub struct ExecuteRequest {
    pub agent: AgentConfig,
    pub prompt: String,
    /// Image paths forwarded to agents that accept them
    pub images: Vec<PathBuf>,
    pub callbacks: AgentCallbacks,
    /// Cancelled when this agent (or the whole run) is being stopped
    pub cancel: CancellationToken,
    /// Slot the provider fills with the child pid right after spawn,
    /// giving the run controller its kill capability
    pub kill_handle: Arc<KillHandle>,
}

/// Capability implemented once per supported agent kind.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// The kind this provider serves
    fn kind(&self) -> AgentKind;

    /// Model ids this agent accepts
    async fn discover_models(&self) -> Vec<String>;

    /// Run the agent to completion (or cancellation).
    ///
    /// Never fails outright: errors are carried in the result's `status`
    /// and `errors` fields so the run can continue with the survivors.
    async fn execute(&self, request: ExecuteRequest) -> AgentResult;
}
