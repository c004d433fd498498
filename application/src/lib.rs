//! Application layer for concilium
//!
//! This crate contains the use cases driving the three-stage deliberation
//! pipeline and the port definitions its adapters implement.
//! It depends only on the domain layer.

pub mod ports;
pub mod run_controller;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use ports::{
    agent_provider::{AgentCallbacks, AgentProvider, ExecuteRequest},
    event_sink::{EventSink, JurorStatus, NullSink},
    llm_gateway::{ChatMessage, GatewayError, GatewayResponse, LlmGateway, ParallelHooks, Role},
    run_repository::{RepositoryError, RunRepository},
};
pub use run_controller::{KillHandle, RunController};
pub use use_cases::{
    config_service::{ConfigService, CouncilSettings},
    council::{CouncilConfig, CouncilOutcome, RunCouncilUseCase},
    run_deliberation::{DeliberationError, DeliberationOrchestrator, DeliberationRequest},
};
