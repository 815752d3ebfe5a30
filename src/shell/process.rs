//! `ShellProcess`: a background shell's identity, buffers, and lifecycle
//! (spec §3, §4.2, §4.4).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Status in the shell's forward-only state machine (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Killed,
    Timeout,
}

impl ShellStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShellStatus::Completed | ShellStatus::Failed | ShellStatus::Killed | ShellStatus::Timeout
        )
    }
}

/// Mutable half of a `ShellProcess`, guarded by one mutex so buffer writes
/// and status transitions stay consistent (spec §5 shared-resource policy).
pub(crate) struct ShellMutable {
    pub status: ShellStatus,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_cursor: usize,
    pub stderr_cursor: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A background shell, identified by `shell_<8 hex>` and referenced by that
/// id from the shell manager's map (spec §3).
#[derive(Clone)]
pub struct ShellProcess {
    pub id: String,
    pub command: String,
    pub working_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub pid: Option<u32>,
    pub(crate) state: Arc<Mutex<ShellMutable>>,
}

impl ShellProcess {
    pub(crate) fn new(id: String, command: String, working_dir: PathBuf, pid: Option<u32>) -> Self {
        Self {
            id,
            command,
            working_dir,
            created_at: Utc::now(),
            pid,
            state: Arc::new(Mutex::new(ShellMutable {
                status: ShellStatus::Pending,
                exit_code: None,
                stdout: Vec::new(),
                stderr: Vec::new(),
                stdout_cursor: 0,
                stderr_cursor: 0,
                started_at: None,
                completed_at: None,
            })),
        }
    }

    pub async fn status(&self) -> ShellStatus {
        self.state.lock().await.status
    }

    pub async fn exit_code(&self) -> Option<i32> {
        self.state.lock().await.exit_code
    }

    pub async fn is_running(&self) -> bool {
        self.status().await == ShellStatus::Running
    }

    pub async fn duration_ms(&self) -> Option<i64> {
        let st = self.state.lock().await;
        match (st.started_at, st.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }

    /// Best-effort, non-blocking append of whatever bytes the reader tasks
    /// have already produced into the shared buffers. Returns whether any
    /// new bytes were observed. With a dedicated reader task draining the
    /// pipes continuously (spec §4.2 design (a)), this call just reports
    /// state rather than performing I/O itself.
    pub async fn read_output(&self) -> bool {
        let st = self.state.lock().await;
        st.stdout_cursor < st.stdout.len() || st.stderr_cursor < st.stderr.len()
    }

    /// Returns the unseen slice of output since the last call, advancing
    /// the cursor(s). Once a byte is returned, it is never returned again
    /// (spec §5 ordering guarantees, §8 invariants).
    pub async fn get_new_output(&self, include_stderr: bool) -> String {
        let mut st = self.state.lock().await;
        let stdout_new = String::from_utf8_lossy(&st.stdout[st.stdout_cursor..]).into_owned();
        st.stdout_cursor = st.stdout.len();

        if !include_stderr {
            return stdout_new;
        }

        let stderr_new = String::from_utf8_lossy(&st.stderr[st.stderr_cursor..]).into_owned();
        st.stderr_cursor = st.stderr.len();

        if stderr_new.is_empty() {
            stdout_new
        } else if stdout_new.is_empty() {
            format!("[stderr]\n{stderr_new}")
        } else {
            format!("{stdout_new}\n[stderr]\n{stderr_new}")
        }
    }

    /// Forcibly terminate the process group and transition to `Killed`.
    /// Idempotent: killing an already-terminal shell is a no-op.
    pub async fn kill(&self) {
        let mut st = self.state.lock().await;
        if st.status.is_terminal() {
            return;
        }
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
        st.status = ShellStatus::Killed;
        st.completed_at = Some(Utc::now());
    }

    /// Forcibly terminate the process group and transition to `Timeout`,
    /// distinct from an explicit `KillShell` (spec §4.2). Idempotent:
    /// timing out an already-terminal shell is a no-op.
    pub async fn timeout(&self) {
        let mut st = self.state.lock().await;
        if st.status.is_terminal() {
            return;
        }
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
        st.status = ShellStatus::Timeout;
        st.completed_at = Some(Utc::now());
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
