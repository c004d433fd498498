//! OpenCode agent provider
//!
//! Runs `opencode run --format json` and parses its JSON event lines. The
//! final answer arrives as one or more text parts; the plan is their
//! concatenation.

use super::harness::{finalize_result, prompt_with_images, stream_agent_process, strip_ansi};
use async_trait::async_trait;
use chrono::Utc;
use concilium_application::ports::agent_provider::{AgentProvider, ExecuteRequest};
use concilium_domain::{AgentKind, AgentResult, ParsedEvent, ParsedEventKind, TokenUsage};
use serde_json::Value;

const OPENCODE_BIN: &str = "opencode";

/// Provider for the OpenCode CLI.
pub struct OpenCodeProvider;

impl OpenCodeProvider {
    pub fn new() -> Self {
        Self
    }

    fn build_command(request: &ExecuteRequest) -> Vec<String> {
        let mut command = vec![
            OPENCODE_BIN.to_string(),
            "run".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        if !request.agent.model.is_empty() {
            command.push("--model".to_string());
            command.push(request.agent.model.clone());
        }
        command.push(prompt_with_images(&request.prompt, &request.images));
        command
    }

    fn extract_plan(events: &[ParsedEvent]) -> String {
        events
            .iter()
            .filter(|event| event.event_type == ParsedEventKind::Text)
            .map(|event| event.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

impl Default for OpenCodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentProvider for OpenCodeProvider {
    fn kind(&self) -> AgentKind {
        AgentKind::Opencode
    }

    async fn discover_models(&self) -> Vec<String> {
        // OpenCode proxies provider/model pairs; these are the common ones.
        vec![
            "anthropic/claude-opus-4.6".to_string(),
            "anthropic/claude-sonnet-4.6".to_string(),
            "openai/gpt-5.2".to_string(),
            "google/gemini-3-pro-preview".to_string(),
        ]
    }

    async fn execute(&self, request: ExecuteRequest) -> AgentResult {
        let started_at = Utc::now();
        let command = Self::build_command(&request);
        let outcome = stream_agent_process(&command, &request, parse_line).await;
        let plan = Self::extract_plan(&outcome.events);
        finalize_result(&request, command, started_at, outcome, plan)
    }
}

/// Parse one line of the OpenCode JSON event protocol.
pub fn parse_line(line: &str) -> Vec<ParsedEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let Ok(json) = serde_json::from_str::<Value>(trimmed) else {
        let cleaned = strip_ansi(trimmed);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return Vec::new();
        }
        return vec![ParsedEvent::raw(cleaned).with_raw_line(line)];
    };

    let parsed = match json["type"].as_str() {
        Some("text") => json["text"].as_str().map(ParsedEvent::text),
        Some("reasoning") => json["text"].as_str().map(ParsedEvent::thinking),
        Some("tool" | "tool_use") => {
            let label = json["name"]
                .as_str()
                .or_else(|| json["tool"].as_str())
                .map(|name| format!("Tool: {name}"))
                .unwrap_or_else(|| "Tool use".to_string());
            Some(ParsedEvent::tool_call(label))
        }
        Some("step-finish" | "finish") => {
            let tokens = &json["tokens"];
            let input = tokens["input"].as_u64().unwrap_or(0);
            let output = tokens["output"].as_u64().unwrap_or(0);
            if input == 0 && output == 0 {
                Some(ParsedEvent::status("Step finished"))
            } else {
                // Per-step usage; consumers sum it.
                Some(
                    ParsedEvent::status("Step finished")
                        .with_usage(TokenUsage::new(input, output), false),
                )
            }
        }
        Some("error") => json["message"]
            .as_str()
            .or_else(|| json["error"].as_str())
            .map(|text| ParsedEvent::status(format!("Error: {text}"))),
        _ => None,
    };

    parsed
        .map(|event| vec![event.with_raw_line(line)])
        .unwrap_or_default()
}
