//! Agent status state machine

use serde::{Deserialize, Serialize};

/// Lifecycle of one agent within a run: `queued → running → terminal`.
///
/// Terminal states are absorbing; transitions are emitted to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Queued,
    Running,
    Success,
    Error,
    Cancelled,
    Aborted,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Queued => "queued",
            AgentStatus::Running => "running",
            AgentStatus::Success => "success",
            AgentStatus::Error => "error",
            AgentStatus::Cancelled => "cancelled",
            AgentStatus::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentStatus::Success | AgentStatus::Error | AgentStatus::Cancelled | AgentStatus::Aborted
        )
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!AgentStatus::Queued.is_terminal());
        assert!(!AgentStatus::Running.is_terminal());
        assert!(AgentStatus::Success.is_terminal());
        assert!(AgentStatus::Error.is_terminal());
        assert!(AgentStatus::Cancelled.is_terminal());
        assert!(AgentStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
