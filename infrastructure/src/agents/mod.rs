//! Agent provider adapters
//!
//! One module per supported agent CLI, each with a pure line parser for its
//! native streaming protocol, plus the shared process harness that spawns
//! agents in their own process group and drives the line loop.

pub mod claude;
pub mod codex;
pub mod harness;
pub mod opencode;

use concilium_application::ports::agent_provider::AgentProvider;
use concilium_domain::AgentKind;
use std::collections::HashMap;
use std::sync::Arc;

/// The full provider registry, one entry per supported kind.
pub fn default_providers() -> HashMap<AgentKind, Arc<dyn AgentProvider>> {
    let mut providers: HashMap<AgentKind, Arc<dyn AgentProvider>> = HashMap::new();
    providers.insert(AgentKind::Claude, Arc::new(claude::ClaudeProvider::new()));
    providers.insert(AgentKind::Codex, Arc::new(codex::CodexProvider::new()));
    providers.insert(
        AgentKind::Opencode,
        Arc::new(opencode::OpenCodeProvider::new()),
    );
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_kind() {
        let providers = default_providers();
        for kind in AgentKind::all() {
            let provider = providers.get(&kind).expect("provider registered");
            assert_eq!(provider.kind(), kind);
        }
    }
}
