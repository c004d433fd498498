//! Agent instances and per-run configs

use super::kind::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A caller-selected agent slot, immutable during a run.
///
/// The same kind may appear more than once (e.g. two `opencode` instances
/// with different models); `instance_id` keeps them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInstance {
    /// Opaque unique id for this slot
    pub instance_id: String,
    /// Which agent CLI backs this slot
    pub kind: AgentKind,
    /// Model id to pass to the agent (may be empty for the CLI default)
    #[serde(default)]
    pub model: String,
    /// Disabled instances are skipped at run start
    pub enabled: bool,
}

impl AgentInstance {
    pub fn new(instance_id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            instance_id: instance_id.into(),
            kind,
            model: String::new(),
            enabled: true,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Per-run agent configuration, derived from an enabled [`AgentInstance`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Provider kind
    pub id: AgentKind,
    /// Instance id this config was derived from
    pub instance_id: String,
    /// Human-facing name, `"{kind} · {short model}"`
    pub display_name: String,
    /// Model id (may be empty)
    pub model: String,
    /// Directory the agent process runs in
    pub working_directory: PathBuf,
    /// Extra environment for the spawned process
    pub environment: Option<HashMap<String, String>>,
}

impl AgentConfig {
    /// Derive a config from an instance for the given working directory.
    pub fn from_instance(instance: &AgentInstance, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            id: instance.kind,
            instance_id: instance.instance_id.clone(),
            display_name: display_name(instance.kind, &instance.model),
            model: instance.model.clone(),
            working_directory: working_directory.into(),
            environment: None,
        }
    }

    /// Key used for event attribution and kill-handle registration.
    ///
    /// Falls back to the kind when the instance id is empty.
    pub fn instance_key(&self) -> &str {
        if self.instance_id.is_empty() {
            self.id.as_str()
        } else {
            &self.instance_id
        }
    }
}

/// `"{kind} · {short model}"`, or just the kind when no model is set.
pub fn display_name(kind: AgentKind, model: &str) -> String {
    if model.is_empty() {
        kind.to_string()
    } else {
        format!("{} · {}", kind, short_model(model))
    }
}

/// The segment after the last `'/'`, or the whole id.
pub fn short_model(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}
