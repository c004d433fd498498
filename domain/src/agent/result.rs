//! Normalized agent execution results

use super::event::ParsedEvent;
use super::instance::AgentConfig;
use super::kind::AgentKind;
use super::status::AgentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one agent's execution.
///
/// Invariant: `status == Success` implies `normalized_plan` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    /// Provider kind
    pub id: AgentKind,
    pub instance_id: String,
    pub display_name: String,
    pub status: AgentStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Final text produced by the agent
    pub normalized_plan: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// The argv that launched the process (empty for SDK sessions)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Full ordered event list as parsed from the provider stream
    #[serde(default)]
    pub events: Vec<ParsedEvent>,
}

impl AgentResult {
    /// A result for an agent that never produced anything useful.
    pub fn failed(config: &AgentConfig, error: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: config.id,
            instance_id: config.instance_id.clone(),
            display_name: config.display_name.clone(),
            status: AgentStatus::Error,
            started_at: now,
            ended_at: now,
            normalized_plan: String::new(),
            errors: vec![error.into()],
            command: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }

    /// Usable for stage 1: succeeded and actually produced a plan.
    pub fn is_usable(&self) -> bool {
        self.is_success() && !self.normalized_plan.is_empty()
    }
}
