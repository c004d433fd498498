//! The common event shape all provider protocols normalize into

use serde::{Deserialize, Serialize};

/// Closed tag set for parsed events; consumers should be exhaustive over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsedEventKind {
    Text,
    Thinking,
    ToolCall,
    Status,
    Raw,
}

/// Token totals attached to a parsed event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_cost: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.total_cost = Some(cost);
        self
    }
}

/// One event parsed out of a provider's native stream.
///
/// `raw_line` retains the provider's original line for debugging. When
/// `token_usage_cumulative` is set, consumers must replace prior totals with
/// this event's usage; otherwise they must sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    pub event_type: ParsedEventKind,
    pub text: String,
    #[serde(default)]
    pub raw_line: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub token_usage_cumulative: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ParsedEvent {
    pub fn new(event_type: ParsedEventKind, text: impl Into<String>) -> Self {
        Self {
            event_type,
            text: text.into(),
            raw_line: String::new(),
            token_usage: None,
            token_usage_cumulative: false,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(ParsedEventKind::Text, text)
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self::new(ParsedEventKind::Thinking, text)
    }

    pub fn tool_call(text: impl Into<String>) -> Self {
        Self::new(ParsedEventKind::ToolCall, text)
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(ParsedEventKind::Status, text)
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(ParsedEventKind::Raw, text)
    }

    pub fn with_raw_line(mut self, line: impl Into<String>) -> Self {
        self.raw_line = line.into();
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage, cumulative: bool) -> Self {
        self.token_usage = Some(usage);
        self.token_usage_cumulative = cumulative;
        self
    }
}

/// Collapse an event list into a single cumulative token-usage event.
///
/// Non-cumulative usage sums; a cumulative event replaces the running totals.
/// Events without usage are dropped. Applying this to an already-compacted
/// list is a fixed point.
pub fn compact_events(events: &[ParsedEvent]) -> Vec<ParsedEvent> {
    let mut input_tokens = 0u64;
    let mut output_tokens = 0u64;
    let mut total_cost: Option<f64> = None;
    let mut seen_usage = false;

    for event in events {
        let Some(usage) = &event.token_usage else {
            continue;
        };
        seen_usage = true;
        if event.token_usage_cumulative {
            input_tokens = usage.input_tokens;
            output_tokens = usage.output_tokens;
            total_cost = usage.total_cost;
        } else {
            input_tokens += usage.input_tokens;
            output_tokens += usage.output_tokens;
            if let Some(cost) = usage.total_cost {
                total_cost = Some(total_cost.unwrap_or(0.0) + cost);
            }
        }
    }

    if !seen_usage {
        return Vec::new();
    }

    let mut usage = TokenUsage::new(input_tokens, output_tokens);
    usage.total_cost = total_cost;
    vec![ParsedEvent::status("Token usage").with_usage(usage, true)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage_event(input: u64, output: u64, cumulative: bool) -> ParsedEvent {
        ParsedEvent::status("usage").with_usage(TokenUsage::new(input, output), cumulative)
    }

    #[test]
    fn test_compact_sums_then_replaces_then_sums() {
        // Three non-cumulative, one cumulative reset, one more non-cumulative.
        let events = vec![
            usage_event(10, 20, false),
            usage_event(5, 5, false),
            usage_event(0, 3, false),
            usage_event(100, 50, true),
            usage_event(1, 1, false),
        ];

        let compacted = compact_events(&events);
        assert_eq!(compacted.len(), 1);
        let usage = compacted[0].token_usage.unwrap();
        assert_eq!(usage.input_tokens, 101);
        assert_eq!(usage.output_tokens, 51);
        assert!(compacted[0].token_usage_cumulative);
    }

    #[test]
    fn test_compact_is_fixed_point() {
        let events = vec![usage_event(10, 20, false), usage_event(30, 40, true)];
        let once = compact_events(&events);
        let twice = compact_events(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_compact_without_usage_is_empty() {
        let events = vec![ParsedEvent::text("hello"), ParsedEvent::thinking("hmm")];
        assert!(compact_events(&events).is_empty());
    }

    #[test]
    fn test_compact_sums_costs() {
        let events = vec![
            ParsedEvent::status("u").with_usage(TokenUsage::new(1, 1).with_cost(0.01), false),
            ParsedEvent::status("u").with_usage(TokenUsage::new(2, 2).with_cost(0.02), false),
        ];
        let compacted = compact_events(&events);
        let cost = compacted[0].token_usage.unwrap().total_cost.unwrap();
        assert!((cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_event_serde_skips_defaults() {
        let event = ParsedEvent::text("hi");
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("tokenUsage"));
        assert!(!json.contains("tokenUsageCumulative"));

        let event = usage_event(1, 2, true);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"tokenUsageCumulative\":true"));
        assert!(json.contains("\"inputTokens\":1"));
    }
}
