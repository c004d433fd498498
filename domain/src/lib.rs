//! Domain layer for concilium
//!
//! This crate contains the deliberation data model and the pure pipeline
//! logic: response labeling, ranking parsing, rank aggregation, token-usage
//! compaction and prompt construction. It has no dependencies on
//! infrastructure or presentation concerns.

pub mod agent;
pub mod core;
pub mod council;
pub mod prompt;
pub mod run;

// Re-export commonly used types
pub use agent::{
    event::{ParsedEvent, ParsedEventKind, TokenUsage, compact_events},
    instance::{AgentConfig, AgentInstance},
    kind::AgentKind,
    result::AgentResult,
    status::AgentStatus,
};
pub use crate::core::error::DomainError;
pub use council::{
    aggregate::{AggregateRanking, aggregate_rankings},
    catalog::{ModelInfo, ModelPricing, find_model},
    cost::estimate_cost,
    label::{LabelMap, response_label},
    ranking::parse_ranking,
    stage::{LlmUsage, Stage1Result, Stage2Result, Stage3Result},
};
pub use prompt::template::{ranking_prompt, synthesis_prompt};
pub use run::{
    record::{ModelSnapshot, RunMetadata, RunRecord, SpeedTier},
    summary::{RunStatus, RunSummary},
};
