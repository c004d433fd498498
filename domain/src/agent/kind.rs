//! Agent kind value object

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Supported coding-agent kinds (Value Object)
///
/// Each kind maps to one external agent CLI or SDK session with its own
/// streaming protocol. Adding a kind means implementing a provider for it;
/// nothing else in the pipeline changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Claude,
    Codex,
    Opencode,
}

impl AgentKind {
    /// Get the string identifier for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Opencode => "opencode",
        }
    }

    /// All supported kinds
    pub fn all() -> [AgentKind; 3] {
        [AgentKind::Claude, AgentKind::Codex, AgentKind::Opencode]
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(AgentKind::Claude),
            "codex" => Ok(AgentKind::Codex),
            "opencode" => Ok(AgentKind::Opencode),
            other => Err(DomainError::UnknownAgentKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in AgentKind::all() {
            let parsed: AgentKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<AgentKind, _> = "cursor".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&AgentKind::Opencode).unwrap();
        assert_eq!(json, "\"opencode\"");
        let back: AgentKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AgentKind::Opencode);
    }
}
