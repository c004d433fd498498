//! Claude Code agent provider
//!
//! Runs `claude -p … --output-format stream-json` and parses its JSON event
//! stream. Every line is a standalone JSON document; lines that fail to
//! parse are surfaced as `raw` events after ANSI stripping.

use super::harness::{finalize_result, prompt_with_images, stream_agent_process, strip_ansi};
use async_trait::async_trait;
use chrono::Utc;
use concilium_application::ports::agent_provider::{AgentProvider, ExecuteRequest};
use concilium_domain::{AgentKind, AgentResult, ParsedEvent, ParsedEventKind, TokenUsage};
use serde_json::Value;

const CLAUDE_BIN: &str = "claude";

/// Longest tool detail shown in a `tool_call` label.
const TOOL_DETAIL_MAX: usize = 60;

/// Provider for the Claude Code CLI.
pub struct ClaudeProvider;

impl ClaudeProvider {
    pub fn new() -> Self {
        Self
    }

    fn build_command(request: &ExecuteRequest) -> Vec<String> {
        let mut command = vec![
            CLAUDE_BIN.to_string(),
            "-p".to_string(),
            prompt_with_images(&request.prompt, &request.images),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        if !request.agent.model.is_empty() {
            command.push("--model".to_string());
            command.push(request.agent.model.clone());
        }
        command
    }

    /// The final answer is the `result.result` text, which parses into the
    /// stream's only cumulative text event.
    fn extract_plan(events: &[ParsedEvent]) -> String {
        events
            .iter()
            .rev()
            .find(|event| {
                event.event_type == ParsedEventKind::Text && event.token_usage_cumulative
            })
            .map(|event| event.text.clone())
            .unwrap_or_default()
    }
}

impl Default for ClaudeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentProvider for ClaudeProvider {
    fn kind(&self) -> AgentKind {
        AgentKind::Claude
    }

    async fn discover_models(&self) -> Vec<String> {
        // The CLI has no model-listing endpoint; these are the ids it accepts.
        vec![
            "claude-opus-4.6".to_string(),
            "claude-sonnet-4.6".to_string(),
            "claude-sonnet-4.5".to_string(),
            "claude-haiku-4.5".to_string(),
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

/// Parse one line of the Claude stream-json protocol.
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

    match json.get("type").and_then(Value::as_str) {
        Some("system") => Vec::new(),
        Some("stream_event") => parse_stream_event(&json, line),
        Some("assistant") => parse_assistant(&json, line),
        Some("result") => parse_result(&json, line),
        _ => Vec::new(),
    }
}

fn parse_stream_event(json: &Value, line: &str) -> Vec<ParsedEvent> {
    let event = &json["event"];
    let parsed = match event["type"].as_str() {
        Some("content_block_start") => {
            let block = &event["content_block"];
            match block["type"].as_str() {
                Some("tool_use") => {
                    let label = block["name"]
                        .as_str()
                        .map(|name| format!("Tool: {name}"))
                        .unwrap_or_else(|| "Tool use".to_string());
                    Some(ParsedEvent::tool_call(label))
                }
                Some("thinking") => Some(ParsedEvent::thinking("Thinking...")),
                _ => None,
            }
        }
        Some("content_block_delta") => {
            let delta = &event["delta"];
            match delta["type"].as_str() {
                Some("text_delta") => delta["text"].as_str().map(ParsedEvent::text),
                Some("thinking_delta") => delta["thinking"].as_str().map(ParsedEvent::thinking),
                _ => None,
            }
        }
        Some("message_delta") => match event["delta"]["stop_reason"].as_str() {
            Some("tool_use") => Some(ParsedEvent::status("Executing tools...")),
            Some(reason) => Some(ParsedEvent::status(format!("Response complete ({reason})"))),
            None => None,
        },
        _ => None,
    };

    parsed
        .map(|event| vec![event.with_raw_line(line)])
        .unwrap_or_default()
}

fn parse_assistant(json: &Value, line: &str) -> Vec<ParsedEvent> {
    let message = &json["message"];
    let mut events = Vec::new();

    if let Some(blocks) = message["content"].as_array() {
        for block in blocks {
            match block["type"].as_str() {
                Some("tool_use") => {
                    let name = block["name"].as_str().unwrap_or("tool");
                    let detail = tool_detail(&block["input"]);
                    let label = match detail {
                        Some(detail) => format!("Tool: {name} -> {detail}"),
                        None => format!("Tool: {name}"),
                    };
                    events.push(ParsedEvent::tool_call(label).with_raw_line(line));
                }
                Some("thinking") => {
                    let text = block["thinking"].as_str().unwrap_or("Thinking...");
                    events.push(ParsedEvent::thinking(text).with_raw_line(line));
                }
                _ => {}
            }
        }
    }

    let trailing_text = match message["stop_reason"].as_str() {
        Some("tool_use") => "Executing tools...".to_string(),
        Some(reason) => format!("Turn completed ({reason})"),
        None => "Processing...".to_string(),
    };
    let mut trailing = ParsedEvent::status(trailing_text).with_raw_line(line);
    if let Some(usage) = extract_usage(&message["usage"]) {
        trailing = trailing.with_usage(usage, false);
    }
    events.push(trailing);
    events
}

fn parse_result(json: &Value, line: &str) -> Vec<ParsedEvent> {
    let mut event = match json["result"].as_str() {
        Some(text) => ParsedEvent::text(text),
        None => {
            let is_error = json["subtype"]
                .as_str()
                .is_some_and(|subtype| subtype.contains("error"));
            if is_error {
                ParsedEvent::status("Run failed")
            } else {
                ParsedEvent::status("Run completed")
            }
        }
    };
    event = event.with_raw_line(line);

    // Result usage replaces anything accumulated from assistant turns.
    event.token_usage_cumulative = true;
    if let Some(mut usage) = extract_usage(&json["usage"]) {
        usage.total_cost = json["total_cost_usd"].as_f64().filter(|cost| *cost > 0.0);
        event.token_usage = Some(usage);
    }
    vec![event]
}

/// `input_tokens` plus both cache counters, floored; absent when all zero.
fn extract_usage(usage: &Value) -> Option<TokenUsage> {
    if !usage.is_object() {
        return None;
    }
    let field = |key: &str| usage.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    let input = (field("input_tokens")
        + field("cache_creation_input_tokens")
        + field("cache_read_input_tokens"))
    .floor() as u64;
    let output = field("output_tokens").floor() as u64;
    (input != 0 || output != 0).then(|| TokenUsage::new(input, output))
}

/// `command` or `file_path` from a tool-use input, truncated for display.
fn tool_detail(input: &Value) -> Option<String> {
    let detail = input["command"]
        .as_str()
        .or_else(|| input["file_path"].as_str())?;
    Some(detail.chars().take(TOOL_DETAIL_MAX).collect())
}
