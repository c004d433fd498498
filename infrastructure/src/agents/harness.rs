//! Shared subprocess harness for agent providers
//!
//! Spawns the agent CLI in a fresh process group (so group signals reach its
//! descendants), publishes the pid to the run controller's kill handle, and
//! drives the stdout line loop through the provider's parser. Each parsed
//! event is forwarded to the callbacks in source order; the first output
//! flips the agent to `Running`.

use chrono::Utc;
use concilium_application::ports::agent_provider::ExecuteRequest;
use concilium_domain::{AgentResult, AgentStatus, ParsedEvent};
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Stderr lines kept for error reporting when the agent exits non-zero.
const STDERR_TAIL: usize = 10;

/// How one agent process ended.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub events: Vec<ParsedEvent>,
    pub cancelled: bool,
    pub exit_success: bool,
    pub errors: Vec<String>,
}

/// Strip ANSI escape sequences from a protocol line.
pub fn strip_ansi(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]|\x1b\][^\x07]*\x07").unwrap());
    re.replace_all(text, "").into_owned()
}

/// Append attached image paths to the prompt; the CLIs take file references
/// in-band rather than as flags.
pub fn prompt_with_images(prompt: &str, images: &[PathBuf]) -> String {
    if images.is_empty() {
        return prompt.to_string();
    }
    let mut full = prompt.to_string();
    full.push_str("\n\nAttached images:\n");
    for image in images {
        full.push_str(&format!("- {}\n", image.display()));
    }
    full
}

/// Spawn `command_line` and stream its stdout through `parser`.
pub async fn stream_agent_process<P>(
    command_line: &[String],
    request: &ExecuteRequest,
    parser: P,
) -> ProcessOutcome
where
    P: Fn(&str) -> Vec<ParsedEvent>,
{
    let instance_key = request.agent.instance_key().to_string();
    let (program, args) = match command_line.split_first() {
        Some(split) => split,
        None => {
            return ProcessOutcome {
                events: Vec::new(),
                cancelled: false,
                exit_success: false,
                errors: vec!["Empty agent command line".to_string()],
            };
        }
    };

    if which::which(program).is_err() {
        return ProcessOutcome {
            events: Vec::new(),
            cancelled: false,
            exit_success: false,
            errors: vec![format!("{program} CLI not found in PATH")],
        };
    }

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(&request.agent.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(environment) = &request.agent.environment {
        command.envs(environment);
    }
    // New process group so SIGTERM/SIGKILL reach the agent's descendants.
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            return ProcessOutcome {
                events: Vec::new(),
                cancelled: false,
                exit_success: false,
                errors: vec![format!("Failed to spawn {program}: {error}")],
            };
        }
    };

    if let Some(pid) = child.id() {
        request.kill_handle.set_pid(pid);
    }

    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: Vec<String> = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("agent stderr: {}", line);
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail
        })
    });

    let mut events = Vec::new();
    let mut cancelled = false;
    let mut announced_running = false;

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = request.cancel.cancelled() => {
                    cancelled = true;
                    // The controller signals the process group; make sure the
                    // direct child dies even if it changed groups.
                    let _ = child.start_kill();
                    break;
                }
                line = lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) => {
                    if !announced_running {
                        announced_running = true;
                        (request.callbacks.on_status)(&instance_key, AgentStatus::Running);
                    }
                    for event in parser(&line) {
                        (request.callbacks.on_event)(&instance_key, &event);
                        events.push(event);
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    warn!("Error reading agent stdout: {}", error);
                    break;
                }
            }
        }
    }

    let exit_success = if cancelled {
        let _ = child.wait().await;
        false
    } else {
        match child.wait().await {
            Ok(status) => status.success(),
            Err(error) => {
                warn!("Failed to reap agent process: {}", error);
                false
            }
        }
    };

    let mut errors = Vec::new();
    if let Some(task) = stderr_task
        && let Ok(tail) = task.await
        && !exit_success
        && !cancelled
        && !tail.is_empty()
    {
        errors.push(tail.join("\n"));
    }

    ProcessOutcome {
        events,
        cancelled,
        exit_success,
        errors,
    }
}

/// Assemble the final [`AgentResult`] and emit the terminal status.
pub fn finalize_result(
    request: &ExecuteRequest,
    command: Vec<String>,
    started_at: chrono::DateTime<Utc>,
    outcome: ProcessOutcome,
    normalized_plan: String,
) -> AgentResult {
    let instance_key = request.agent.instance_key().to_string();
    let mut errors = outcome.errors;

    let status = if outcome.cancelled {
        AgentStatus::Cancelled
    } else if !outcome.exit_success {
        if errors.is_empty() {
            errors.push("Agent process exited with failure".to_string());
        }
        AgentStatus::Error
    } else if normalized_plan.is_empty() {
        errors.push("Agent produced no final output".to_string());
        AgentStatus::Error
    } else {
        AgentStatus::Success
    };

    (request.callbacks.on_status)(&instance_key, status);

    AgentResult {
        id: request.agent.id,
        instance_id: request.agent.instance_id.clone(),
        display_name: request.agent.display_name.clone(),
        status,
        started_at,
        ended_at: Utc::now(),
        normalized_plan: if status == AgentStatus::Success {
            normalized_plan
        } else {
            String::new()
        },
        errors,
        command,
        events: outcome.events,
    }
}
