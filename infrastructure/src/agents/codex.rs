//! Codex agent provider
//!
//! Runs `codex exec --json` and parses its JSONL event stream. Each line is
//! `{"id":…,"msg":{"type":…,…}}`; the answer is the last `agent_message`.

use super::harness::{finalize_result, prompt_with_images, stream_agent_process, strip_ansi};
use async_trait::async_trait;
use chrono::Utc;
use concilium_application::ports::agent_provider::{AgentProvider, ExecuteRequest};
use concilium_domain::{AgentKind, AgentResult, ParsedEvent, ParsedEventKind, TokenUsage};
use serde_json::Value;

const CODEX_BIN: &str = "codex";

/// Provider for the Codex CLI.
pub struct CodexProvider;

impl CodexProvider {
    pub fn new() -> Self {
        Self
    }

    fn build_command(request: &ExecuteRequest) -> Vec<String> {
        let mut command = vec![
            CODEX_BIN.to_string(),
            "exec".to_string(),
            "--json".to_string(),
        ];
        if !request.agent.model.is_empty() {
            command.push("-m".to_string());
            command.push(request.agent.model.clone());
        }
        command.push(prompt_with_images(&request.prompt, &request.images));
        command
    }

    /// The last agent message is the answer; reasoning and tool chatter
    /// before it do not count.
    fn extract_plan(events: &[ParsedEvent]) -> String {
        events
            .iter()
            .rev()
            .find(|event| event.event_type == ParsedEventKind::Text)
            .map(|event| event.text.clone())
            .unwrap_or_default()
    }
}

impl Default for CodexProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentProvider for CodexProvider {
    fn kind(&self) -> AgentKind {
        AgentKind::Codex
    }

    async fn discover_models(&self) -> Vec<String> {
        vec![
            "gpt-5.2-codex".to_string(),
            "gpt-5.1-codex-max".to_string(),
            "gpt-5.1-codex-mini".to_string(),
            "gpt-5.2".to_string(),
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

/// Parse one line of the Codex `exec --json` protocol.
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

    let message = &json["msg"];
    let parsed = match message["type"].as_str() {
        Some("agent_message") => message["message"].as_str().map(ParsedEvent::text),
        Some("agent_reasoning") => message["text"].as_str().map(ParsedEvent::thinking),
        Some("exec_command_begin") => {
            let detail = message["command"]
                .as_array()
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .or_else(|| message["command"].as_str().map(str::to_string));
            Some(match detail {
                Some(detail) => ParsedEvent::tool_call(format!("Exec: {detail}")),
                None => ParsedEvent::tool_call("Exec"),
            })
        }
        Some("mcp_tool_call_begin") => {
            let label = message["invocation"]["tool"]
                .as_str()
                .or_else(|| message["tool"].as_str())
                .map(|tool| format!("Tool: {tool}"))
                .unwrap_or_else(|| "Tool use".to_string());
            Some(ParsedEvent::tool_call(label))
        }
        Some("token_count") => token_count_event(message),
        Some("task_complete") => Some(ParsedEvent::status("Task complete")),
        Some("error") => message["message"]
            .as_str()
            .map(|text| ParsedEvent::status(format!("Error: {text}"))),
        _ => None,
    };

    parsed
        .map(|event| vec![event.with_raw_line(line)])
        .unwrap_or_default()
}

/// Codex reports running totals, so token counts replace prior usage.
fn token_count_event(message: &Value) -> Option<ParsedEvent> {
    let usage = message
        .get("info")
        .and_then(|info| info.get("total_token_usage"))
        .unwrap_or(message);
    let input = usage["input_tokens"].as_u64().unwrap_or(0);
    let output = usage["output_tokens"].as_u64().unwrap_or(0);
    if input == 0 && output == 0 {
        return None;
    }
    Some(ParsedEvent::status("Token usage").with_usage(TokenUsage::new(input, output), true))
}
