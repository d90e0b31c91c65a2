// src/exec/command.rs

//! Process-based execution backend.
//!
//! A `CommandBackend` reaches the target by spawning a local launcher
//! program (`pct exec`, `ssh`, or plain `sh` for local testing) and handing
//! it the composed script.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::backend::{BackendError, BackendFuture, ExecBackend, ExecResult};

/// Placeholder in launcher arguments that is replaced by the target id.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// How the script is handed to the launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptDelivery {
    /// Appended as the final launcher argument (`bash -c <script>`).
    Argument,
    /// Written to the launcher's stdin (`bash -s`).
    Stdin,
}

#[derive(Debug, Clone)]
pub struct CommandBackend {
    launcher: Vec<String>,
    delivery: ScriptDelivery,
    /// Exit codes the launcher uses for its own failures (e.g. `ssh` exits
    /// with 255 when the connection fails). The remote command can exit with
    /// the same code, so these are reported but not retried.
    transport_exit_codes: Vec<i32>,
}

impl CommandBackend {
    pub fn new(launcher: Vec<String>) -> Self {
        Self {
            launcher,
            delivery: ScriptDelivery::Argument,
            transport_exit_codes: Vec::new(),
        }
    }

    /// Run scripts on the local machine with `sh -c`; the target id is ignored.
    pub fn local() -> Self {
        Self::new(vec!["sh".into(), "-c".into()])
    }

    /// Run scripts inside a Proxmox LXC container via `pct exec`.
    pub fn pct() -> Self {
        Self::new(vec![
            "pct".into(),
            "exec".into(),
            TARGET_PLACEHOLDER.into(),
            "--".into(),
            "bash".into(),
            "-c".into(),
        ])
    }

    /// Run scripts on a host reachable over `ssh`, streaming the script on stdin.
    pub fn ssh() -> Self {
        Self::new(vec![
            "ssh".into(),
            "-o".into(),
            "BatchMode=yes".into(),
            TARGET_PLACEHOLDER.into(),
            "bash".into(),
            "-s".into(),
        ])
        .with_delivery(ScriptDelivery::Stdin)
        .with_transport_exit_codes(vec![255])
    }

    pub fn with_delivery(mut self, delivery: ScriptDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_transport_exit_codes(mut self, codes: Vec<i32>) -> Self {
        self.transport_exit_codes = codes;
        self
    }

    pub fn launcher(&self) -> &[String] {
        &self.launcher
    }

    fn build_command(&self, target: &str, script: &str) -> Result<Command, BackendError> {
        let mut args = self
            .launcher
            .iter()
            .map(|arg| arg.replace(TARGET_PLACEHOLDER, target));

        let program = args
            .next()
            .ok_or_else(|| BackendError::Transport("launcher command is empty".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);

        match self.delivery {
            ScriptDelivery::Argument => {
                cmd.arg(script).stdin(Stdio::null());
            }
            ScriptDelivery::Stdin => {
                cmd.stdin(Stdio::piped());
            }
        }

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        Ok(cmd)
    }
}

impl ExecBackend for CommandBackend {
    fn exec<'a>(
        &'a self,
        target: &'a str,
        script: &'a str,
        timeout: Duration,
    ) -> BackendFuture<'a> {
        Box::pin(async move {
            let mut cmd = self.build_command(target, script)?;

            let mut child = cmd.spawn().map_err(|e| {
                BackendError::Transport(format!(
                    "spawning launcher '{}': {e}",
                    self.launcher.first().map(String::as_str).unwrap_or_default()
                ))
            })?;

            if self.delivery == ScriptDelivery::Stdin {
                if let Some(mut stdin) = child.stdin.take() {
                    let body = script.to_string();
                    // Feed stdin concurrently so a chatty child cannot block
                    // on a full stdout pipe while we are still writing.
                    tokio::spawn(async move {
                        if let Err(e) = stdin.write_all(body.as_bytes()).await {
                            debug!(error = %e, "failed to write script to launcher stdin");
                        }
                        if let Err(e) = stdin.shutdown().await {
                            debug!(error = %e, "failed to close launcher stdin");
                        }
                    });
                }
            }

            // Dropping the wait future on timeout drops the child, which is
            // killed because of `kill_on_drop(true)`.
            let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Err(_) => return Err(BackendError::TimedOut),
                Ok(res) => res.map_err(|e| {
                    BackendError::Transport(format!("waiting for launcher: {e}"))
                })?,
            };

            let exit_code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

            if self.transport_exit_codes.contains(&exit_code) {
                warn!(
                    target_id = %target,
                    exit_code,
                    "launcher exit code may indicate a transport failure"
                );
                return Err(BackendError::LauncherExit {
                    exit_code,
                    message: stderr.trim().to_string(),
                });
            }

            Ok(ExecResult {
                exit_code,
                stdout,
                stderr,
            })
        })
    }
}
