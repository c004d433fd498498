//! The persistent record of one deliberation run
//!
//! A record is assembled once at the end of a run and never mutated after
//! persist. The serialized form uses camelCase field names; compact JSON is
//! the preferred storage encoding.

use crate::agent::kind::AgentKind;
use crate::agent::result::AgentResult;
use crate::council::aggregate::AggregateRanking;
use crate::council::label::LabelMap;
use crate::council::stage::{Stage1Result, Stage2Result, Stage3Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Latency classification for a model snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Fast,
    Balanced,
    Slow,
}

impl SpeedTier {
    /// Under 15s is fast, under 60s balanced, anything slower is slow.
    pub fn from_latency_ms(latency_ms: i64) -> Self {
        if latency_ms < 15_000 {
            SpeedTier::Fast
        } else if latency_ms < 60_000 {
            SpeedTier::Balanced
        } else {
            SpeedTier::Slow
        }
    }
}

/// Point-in-time characteristics of an agent's model, captured per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSnapshot {
    pub model_id: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_per_1k_tokens: Option<f64>,
    pub latency_ms: i64,
    pub speed_tier: SpeedTier,
}

/// Deliberation metadata: blind-label mapping, aggregate rankings, notes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    #[serde(default)]
    pub label_to_model: LabelMap,
    #[serde(default)]
    pub aggregate_rankings: Vec<AggregateRanking>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_snapshots: Option<BTreeMap<String, ModelSnapshot>>,
}

impl RunMetadata {
    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Everything one deliberation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub prompt: String,
    pub working_directory: String,
    pub selected_agents: Vec<AgentKind>,
    pub agents: Vec<AgentResult>,
    pub stage1: Vec<Stage1Result>,
    pub stage2: Vec<Stage2Result>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage3: Option<Stage3Result>,
    pub metadata: RunMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::instance::{AgentConfig, AgentInstance};

    #[test]
    fn test_speed_tier_thresholds() {
        assert_eq!(SpeedTier::from_latency_ms(0), SpeedTier::Fast);
        assert_eq!(SpeedTier::from_latency_ms(14_999), SpeedTier::Fast);
        assert_eq!(SpeedTier::from_latency_ms(15_000), SpeedTier::Balanced);
        assert_eq!(SpeedTier::from_latency_ms(59_999), SpeedTier::Balanced);
        assert_eq!(SpeedTier::from_latency_ms(60_000), SpeedTier::Slow);
    }

    #[test]
    fn test_record_json_roundtrip_is_stable() {
        let config = AgentConfig::from_instance(
            &AgentInstance::new("i-1", AgentKind::Opencode).with_model("x/y"),
            "/work",
        );
        let record = RunRecord {
            id: "run-1".to_string(),
            created_at: Utc::now(),
            prompt: "hello".to_string(),
            working_directory: "/work".to_string(),
            selected_agents: vec![AgentKind::Opencode],
            agents: vec![AgentResult::failed(&config, "boom")],
            stage1: vec![Stage1Result::new("opencode · y", "plan")],
            stage2: Vec::new(),
            stage3: Some(Stage3Result::synthetic("chairman", "answer")),
            metadata: RunMetadata::default(),
        };

        // Canonical JSON form survives a serialize → deserialize → serialize trip.
        let first = serde_json::to_string(&record).unwrap();
        let reparsed: RunRecord = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_uses_camel_case_fields() {
        let record = RunRecord {
            id: "run-2".to_string(),
            created_at: Utc::now(),
            prompt: String::new(),
            working_directory: String::new(),
            selected_agents: Vec::new(),
            agents: Vec::new(),
            stage1: Vec::new(),
            stage2: Vec::new(),
            stage3: None,
            metadata: RunMetadata::default(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"selectedAgents\""));
        assert!(json.contains("\"workingDirectory\""));
        assert!(!json.contains("\"stage3\""));
    }
}
