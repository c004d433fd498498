//! Run listing summaries

use super::record::RunRecord;
use crate::agent::status::AgentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const PREVIEW_CHARS: usize = 70;

/// Coarse run outcome derived from the per-agent statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Running,
    PartialError,
    Mixed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Running => "running",
            RunStatus::PartialError => "partial_error",
            RunStatus::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the run listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub prompt_preview: String,
    pub status: RunStatus,
}

impl RunRecord {
    /// Derive the coarse status from agent outcomes.
    pub fn derived_status(&self) -> RunStatus {
        if self.agents.iter().all(|a| a.status == AgentStatus::Success) {
            RunStatus::Success
        } else if self.agents.iter().any(|a| a.status == AgentStatus::Running) {
            RunStatus::Running
        } else if self.agents.iter().any(|a| a.status == AgentStatus::Error) {
            RunStatus::PartialError
        } else {
            RunStatus::Mixed
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            prompt_preview: self.prompt.chars().take(PREVIEW_CHARS).collect(),
            status: self.derived_status(),
        }
    }
}
