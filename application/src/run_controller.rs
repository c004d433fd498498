//! Per-run cancellation and process termination
//!
//! Each run owns one [`RunController`]. Agent tasks register a
//! [`KillHandle`] keyed by instance key; cancelling the controller signals
//! every registered handle. Process-backed agents are killed by process
//! group so descendants die too; SDK-session agents get their abort token
//! cancelled instead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Grace period between SIGTERM and SIGKILL escalation.
const KILL_GRACE: Duration = Duration::from_secs(3);

/// Kill capability for one agent.
///
/// The pid slot is filled by the provider right after spawn. Providers that
/// hold an SDK session instead of a process leave it empty; for those the
/// abort token is the only lever.
pub struct KillHandle {
    pid: Mutex<Option<i32>>,
    abort: CancellationToken,
}

impl KillHandle {
    pub fn new(abort: CancellationToken) -> Self {
        Self {
            pid: Mutex::new(None),
            abort,
        }
    }

    /// Record the spawned child's pid.
    pub fn set_pid(&self, pid: u32) {
        if let Ok(mut slot) = self.pid.lock() {
            *slot = Some(pid as i32);
        }
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid.lock().ok().and_then(|slot| *slot)
    }

    /// The per-agent abort token (also handed to the provider as its
    /// cancellation token).
    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }
}

/// Send a signal to the agent's process group, falling back to the process
/// itself. Errors are swallowed: the process may already be gone.
#[cfg(unix)]
fn signal_group(pid: i32, signal: libc::c_int) {
    // Negative pid addresses the whole process group.
    unsafe {
        if libc::kill(-pid, signal) != 0 {
            let _ = libc::kill(pid, signal);
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: i32, _signal: i32) {}

#[cfg(unix)]
const SIGTERM: libc::c_int = libc::SIGTERM;
#[cfg(unix)]
const SIGKILL: libc::c_int = libc::SIGKILL;
#[cfg(not(unix))]
const SIGTERM: i32 = 15;
#[cfg(not(unix))]
const SIGKILL: i32 = 9;

/// Owns the cancelled flag and the kill-handle registry for one run.
pub struct RunController {
    cancelled: AtomicBool,
    root: CancellationToken,
    handles: Mutex<HashMap<String, Arc<KillHandle>>>,
}

impl RunController {
    pub fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            root: CancellationToken::new(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Derive a per-agent token that fires on run-level cancel.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn register(&self, instance_key: impl Into<String>, handle: Arc<KillHandle>) {
        if let Ok(mut handles) = self.handles.lock() {
            handles.insert(instance_key.into(), handle);
        }
    }

    pub fn unregister(&self, instance_key: &str) {
        if let Ok(mut handles) = self.handles.lock() {
            handles.remove(instance_key);
        }
    }

    /// Cancel the whole run. Idempotent: only the first call signals.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Run controller cancelled, terminating registered agents");
        self.root.cancel();

        let handles: Vec<Arc<KillHandle>> = self
            .handles
            .lock()
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default();
        for handle in handles {
            Self::terminate(handle);
        }
    }

    /// Cancel one agent. Returns whether the key was known.
    pub fn cancel_agent(&self, instance_key: &str) -> bool {
        let handle = self
            .handles
            .lock()
            .ok()
            .and_then(|handles| handles.get(instance_key).cloned());
        match handle {
            Some(handle) => {
                Self::terminate(handle);
                true
            }
            None => false,
        }
    }

    /// SIGTERM the process group now, SIGKILL it after the grace period.
    /// Without a pid, cancel the abort token (SDK-session case).
    fn terminate(handle: Arc<KillHandle>) {
        handle.abort.cancel();
        let Some(pid) = handle.pid() else {
            return;
        };
        signal_group(pid, SIGTERM);
        tokio::spawn(async move {
            tokio::time::sleep(KILL_GRACE).await;
            signal_group(pid, SIGKILL);
            #[cfg(unix)]
            unsafe {
                let _ = libc::kill(pid, libc::SIGKILL);
            }
        });
    }
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let controller = RunController::new();
        assert!(!controller.is_cancelled());
        controller.cancel();
        assert!(controller.is_cancelled());
        // Second cancel is a no-op.
        controller.cancel();
        assert!(controller.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_fires_child_tokens() {
        let controller = RunController::new();
        let token = controller.child_token();
        assert!(!token.is_cancelled());
        controller.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_agent_aborts_sdk_sessions() {
        let controller = RunController::new();
        let token = controller.child_token();
        let handle = Arc::new(KillHandle::new(token.clone()));
        controller.register("agent-1", handle);

        assert!(controller.cancel_agent("agent-1"));
        assert!(token.is_cancelled());
        // Per-agent cancel does not cancel the run.
        assert!(!controller.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_agent_unknown_key() {
        let controller = RunController::new();
        assert!(!controller.cancel_agent("nope"));
    }

    #[tokio::test]
    async fn test_unregister_removes_handle() {
        let controller = RunController::new();
        let handle = Arc::new(KillHandle::new(controller.child_token()));
        controller.register("agent-1", handle);
        controller.unregister("agent-1");
        assert!(!controller.cancel_agent("agent-1"));
    }

    #[test]
    fn test_kill_handle_pid_slot() {
        let handle = KillHandle::new(CancellationToken::new());
        assert_eq!(handle.pid(), None);
        handle.set_pid(4242);
        assert_eq!(handle.pid(), Some(4242));
    }
}
