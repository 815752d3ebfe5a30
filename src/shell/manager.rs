//! Shell manager: owns background processes, drains their output, and
//! reaps them (spec §4.2, §4.4, §5).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::error::ShellError;
use super::process::{ShellProcess, ShellStatus};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

fn generate_shell_id() -> String {
    let n: u32 = rand::thread_rng().gen();
    format!("shell_{n:08x}")
}

/// A name-keyed map of `shell_id -> ShellProcess`. The mutex guards only
/// map mutations (insert/remove); once a caller has a `ShellProcess`
/// handle, reads of its buffers go through the process's own lock, never
/// this one — so no lock here is ever held across a suspension point
/// (spec §5).
pub struct ShellManager {
    shells: Mutex<HashMap<String, ShellProcess>>,
}

impl Default for ShellManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellManager {
    /// The mutex is allocated lazily (via `Mutex::new` at construction,
    /// which itself needs no running executor) so a `ShellManager` can be
    /// built outside any concurrent context.
    pub fn new() -> Self {
        Self {
            shells: Mutex::new(HashMap::new()),
        }
    }

    /// Spawn `command` via `bash -c`, draining its stdout/stderr into the
    /// returned `ShellProcess`'s buffers from a dedicated reader task.
    pub async fn create_shell(
        &self,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<ShellProcess, ShellError> {
        let command = command.into();
        let working_dir = working_dir.into();

        let mut cmd = Command::new("bash");
        cmd.args(["-c", &command])
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(env) = &env {
            for (k, v) in env {
                cmd.env(k, v);
            }
        }

        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setpgid(nix::unistd::Pid::from_raw(0), nix::unistd::Pid::from_raw(0)).ok();
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| ShellError::SpawnFailed(e.to_string()))?;
        let pid = child.id();

        let id = generate_shell_id();
        let process = ShellProcess::new(id.clone(), command, working_dir, pid);

        {
            let mut st = process.state.lock().await;
            st.status = ShellStatus::Running;
            st.started_at = Some(Utc::now());
        }

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let state = process.state.clone();

        tokio::spawn(async move {
            let mut stdout_buf = [0u8; 4096];
            let mut stderr_buf = [0u8; 4096];
            loop {
                tokio::select! {
                    Ok(n) = async { match &mut stdout { Some(s) => s.read(&mut stdout_buf).await, None => std::future::pending().await } }, if stdout.is_some() => {
                        if n == 0 { stdout = None; } else {
                            state.lock().await.stdout.extend_from_slice(&stdout_buf[..n]);
                        }
                    }
                    Ok(n) = async { match &mut stderr { Some(s) => s.read(&mut stderr_buf).await, None => std::future::pending().await } }, if stderr.is_some() => {
                        if n == 0 { stderr = None; } else {
                            state.lock().await.stderr.extend_from_slice(&stderr_buf[..n]);
                        }
                    }
                    else => break,
                }
            }

            let wait_result = child.wait().await;
            let mut st = state.lock().await;
            if st.status.is_terminal() {
                // Already killed/timed-out by another path.
                return;
            }
            match wait_result {
                Ok(status) => {
                    st.exit_code = status.code();
                    st.status = if status.success() {
                        ShellStatus::Completed
                    } else {
                        ShellStatus::Failed
                    };
                }
                Err(_) => {
                    st.status = ShellStatus::Failed;
                }
            }
            st.completed_at = Some(Utc::now());
        });

        Ok(process)
    }

    pub async fn get_shell(&self, id: &str) -> Option<ShellProcess> {
        self.shells.lock().await.get(id).cloned()
    }

    /// Insert a process the caller already spawned via `create_shell` into
    /// the manager's table so it can be looked up by id later.
    pub async fn track(&self, process: ShellProcess) {
        self.shells.lock().await.insert(process.id.clone(), process);
    }

    pub async fn list_shells(&self) -> Vec<ShellProcess> {
        self.shells.lock().await.values().cloned().collect()
    }

    pub async fn list_running(&self) -> Vec<ShellProcess> {
        let shells = self.shells.lock().await;
        let mut running = Vec::new();
        for shell in shells.values() {
            if shell.is_running().await {
                running.push(shell.clone());
            }
        }
        running
    }

    /// Remove non-running shells whose completion is older than
    /// `max_age_seconds`. Returns the number removed.
    pub async fn cleanup_completed(&self, max_age_seconds: i64) -> usize {
        let now = Utc::now();
        let mut shells = self.shells.lock().await;
        let mut to_remove = Vec::new();
        for (id, shell) in shells.iter() {
            let st = shell.state.lock().await;
            if st.status.is_terminal() {
                if let Some(completed_at) = st.completed_at {
                    if (now - completed_at).num_seconds() >= max_age_seconds {
                        to_remove.push(id.clone());
                    }
                }
            }
        }
        let count = to_remove.len();
        for id in to_remove {
            shells.remove(&id);
        }
        count
    }

    /// Forcibly terminate every running shell. Returns the number killed.
    pub async fn kill_all(&self) -> usize {
        let shells = self.shells.lock().await;
        let mut count = 0;
        for shell in shells.values() {
            if shell.is_running().await {
                shell.kill().await;
                count += 1;
            }
        }
        count
    }

    /// Test helper: kill everything, then empty the map.
    pub async fn reset(&self) {
        self.kill_all().await;
        self.shells.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_shell_runs_to_completion() {
        let manager = ShellManager::new();
        let process = manager
            .create_shell("echo hello", std::env::temp_dir(), None)
            .await
            .unwrap();
        manager.track(process.clone()).await;

        for _ in 0..50 {
            if process.status().await.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        assert_eq!(process.status().await, ShellStatus::Completed);
        assert_eq!(process.exit_code().await, Some(0));
        let output = process.get_new_output(true).await;
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn get_new_output_never_repeats_bytes() {
        let manager = ShellManager::new();
        let process = manager
            .create_shell("echo a && sleep 0.2 && echo b", std::env::temp_dir(), None)
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let first = process.get_new_output(true).await;
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let second = process.get_new_output(true).await;

        assert!(first.contains('a'));
        assert!(!second.contains('a'));
        assert!(second.contains('b'));
    }

    #[tokio::test]
    async fn kill_all_terminates_running_shells() {
        let manager = ShellManager::new();
        let process = manager
            .create_shell("sleep 30", std::env::temp_dir(), None)
            .await
            .unwrap();
        manager.track(process.clone()).await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let killed = manager.kill_all().await;
        assert_eq!(killed, 1);
        assert_eq!(process.status().await, ShellStatus::Killed);
    }

    #[tokio::test]
    async fn get_shell_missing_returns_none() {
        let manager = ShellManager::new();
        assert!(manager.get_shell("shell_deadbeef").await.is_none());
    }
}
