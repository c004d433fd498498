//! Infrastructure layer for concilium
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the OpenRouter gateway, the agent providers, the
//! file-backed run repository, configuration and secret stores, and the
//! JSONL event log.

pub mod agents;
pub mod config;
pub mod logging;
pub mod openrouter;
pub mod runs;

// Re-export commonly used types
pub use agents::{
    claude::ClaudeProvider, codex::CodexProvider, default_providers, opencode::OpenCodeProvider,
};
pub use config::{secret::Base64SecretStore, store::TomlConfigStore};
pub use logging::event_log::JsonlEventSink;
pub use openrouter::gateway::OpenRouterGateway;
pub use runs::repository::FileRunRepository;
