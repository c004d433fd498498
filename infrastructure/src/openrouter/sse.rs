//! SSE line parsing for streamed chat completions
//!
//! OpenRouter streams `data: {json}` lines terminated by `data: [DONE]`.
//! One payload can carry both a content delta and (on the final chunk with
//! `include_usage`) the usage block, so a single line may yield several
//! events.

use super::wire::StreamChunk;
use concilium_domain::LlmUsage;
use tracing::warn;

/// One event extracted from an SSE line.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A text delta
    Chunk(String),
    /// Final usage totals
    Usage(LlmUsage),
    /// `[DONE]` — the stream is over
    Done,
}

/// Parse one SSE line into zero or more events.
///
/// Empty lines, comments and unknown fields are skipped; malformed JSON is
/// logged and dropped so one bad chunk does not kill the stream.
pub fn parse_sse_line(line: &str) -> Vec<SseEvent> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Vec::new();
    }
    let Some(data) = line.strip_prefix("data:") else {
        return Vec::new();
    };
    let data = data.trim();

    if data == "[DONE]" {
        return vec![SseEvent::Done];
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(error) => {
            warn!("Failed to parse SSE chunk: {error}");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for choice in &chunk.choices {
        if let Some(content) = &choice.delta.content
            && !content.is_empty()
        {
            events.push(SseEvent::Chunk(content.clone()));
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(SseEvent::Usage(usage.into()));
    }
    events
}
