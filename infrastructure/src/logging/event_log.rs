//! JSONL event log sink
//!
//! Writes every run notification as a single JSON line with a `type` field
//! and UTC timestamp, appended through a buffered writer. This is separate
//! from `tracing`: tracing carries diagnostics, this file carries the
//! machine-readable run transcript.

use concilium_application::ports::event_sink::{EventSink, JurorStatus};
use concilium_domain::{AgentStatus, LlmUsage, ParsedEvent, RunRecord};
use serde_json::json;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// [`EventSink`] writing one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes per event — the log is
/// append-only and read while runs are live. Logging failures are ignored.
pub struct JsonlEventSink {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventSink {
    /// Create a sink writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(error) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create event log directory {}: {}", parent.display(), error);
            return None;
        }

        let file = match File::create(path) {
            Ok(file) => file,
            Err(error) => {
                warn!("Could not create event log file {}: {}", path.display(), error);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, event_type: &str, payload: serde_json::Value) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let record = if let serde_json::Value::Object(mut map) = payload {
            map.insert("type".to_string(), json!(event_type));
            map.insert("timestamp".to_string(), json!(timestamp));
            serde_json::Value::Object(map)
        } else {
            json!({"type": event_type, "timestamp": timestamp, "data": payload})
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl EventSink for JsonlEventSink {
    fn on_stage_change(&self, stage: u8, summary: &str) {
        self.write("stage:change", json!({"stage": stage, "summary": summary}));
    }

    fn on_agent_status(&self, instance_key: &str, status: AgentStatus, display_name: Option<&str>) {
        self.write(
            "agent:status",
            json!({"instanceKey": instance_key, "status": status, "displayName": display_name}),
        );
    }

    fn on_agent_event(&self, instance_key: &str, event: &ParsedEvent) {
        self.write(
            "agent:event",
            json!({"instanceKey": instance_key, "event": event}),
        );
    }

    fn on_juror_status(&self, model: &str, status: JurorStatus) {
        self.write(
            "juror:status",
            json!({"model": model, "status": status.as_str()}),
        );
    }

    fn on_juror_chunk(&self, model: &str, chunk: &str) {
        self.write("juror:chunk", json!({"model": model, "chunk": chunk}));
    }

    fn on_juror_complete(&self, model: &str, success: bool, usage: Option<&LlmUsage>) {
        self.write(
            "juror:complete",
            json!({"model": model, "success": success, "usage": usage}),
        );
    }

    fn on_synthesis_start(&self) {
        self.write("synthesis:start", json!({}));
    }

    fn on_run_complete(&self, record: &RunRecord) {
        self.write("run:complete", json!({"runId": record.id}));
    }

    fn on_run_error(&self, message: &str) {
        self.write("run:error", json!({"message": message}));
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
