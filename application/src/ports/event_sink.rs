//! Progress notification port
//!
//! One-way notifications emitted while a run progresses. Implementations
//! live outside the core (console renderers, log files, GUIs); methods must
//! not block and must not fail.

use concilium_domain::{AgentStatus, LlmUsage, ParsedEvent, RunRecord};

/// Lifecycle of one juror during stage 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JurorStatus {
    Evaluating,
    Complete,
    Failed,
}

impl JurorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JurorStatus::Evaluating => "evaluating",
            JurorStatus::Complete => "complete",
            JurorStatus::Failed => "failed",
        }
    }
}

/// Sink for run progress notifications
///
/// Exactly one terminal notification is delivered per run:
/// `on_run_complete` or `on_run_error`, never both.
pub trait EventSink: Send + Sync {
    /// A pipeline stage began (1, 2 or 3)
    fn on_stage_change(&self, stage: u8, summary: &str);

    /// An agent moved through its status machine
    fn on_agent_status(&self, instance_key: &str, status: AgentStatus, display_name: Option<&str>);

    /// An agent's provider parsed one event from its stream
    fn on_agent_event(&self, instance_key: &str, event: &ParsedEvent);

    /// A juror started, finished or failed
    fn on_juror_status(&self, _model: &str, _status: JurorStatus) {}

    /// A juror streamed a raw text chunk
    fn on_juror_chunk(&self, _model: &str, _chunk: &str) {}

    /// A juror's call completed (once per requested juror)
    fn on_juror_complete(&self, _model: &str, _success: bool, _usage: Option<&LlmUsage>) {}

    /// The chairman synthesis call is about to start
    fn on_synthesis_start(&self) {}

    /// Terminal: the run finished and was persisted
    fn on_run_complete(&self, record: &RunRecord);

    /// Terminal: the run failed
    fn on_run_error(&self, message: &str);
}

/// No-op sink for tests and headless runs
pub struct NullSink;

impl EventSink for NullSink {
    fn on_stage_change(&self, _stage: u8, _summary: &str) {}
    fn on_agent_status(&self, _key: &str, _status: AgentStatus, _display_name: Option<&str>) {}
    fn on_agent_event(&self, _key: &str, _event: &ParsedEvent) {}
    fn on_run_complete(&self, _record: &RunRecord) {}
    fn on_run_error(&self, _message: &str) {}
}
