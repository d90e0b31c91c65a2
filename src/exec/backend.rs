// src/exec/backend.rs

//! Pluggable execution backend abstraction.
//!
//! The [`ExecutionContext`](super::ExecutionContext) talks to an
//! `ExecBackend` instead of spawning processes itself. This makes it easy to
//! swap in a fake backend in tests while keeping the production process
//! runner in [`command`](super::command).

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Captured result of one command that ran to completion on the target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Failure to run a command at all, as opposed to the command itself
/// returning a non-zero status (which is a successful [`ExecResult`]).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The channel to the target could not be opened or broke mid-call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The command did not finish within the allotted time.
    #[error("timed out")]
    TimedOut,

    /// The launcher exited with a code it also uses for its own connection
    /// failures (`ssh` and 255). The remote command may already have run, so
    /// this is never retried.
    #[error("launcher exited with {exit_code}: {message}")]
    LauncherExit { exit_code: i32, message: String },
}

pub type BackendFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<ExecResult, BackendError>> + Send + 'a>>;

/// Trait abstracting how a composed script reaches the remote target.
///
/// Production code uses [`CommandBackend`](super::CommandBackend); tests can
/// provide their own implementation that doesn't spawn real processes.
pub trait ExecBackend: Send + Sync {
    /// Run `script` on `target`, giving up after `timeout`.
    fn exec<'a>(&'a self, target: &'a str, script: &'a str, timeout: Duration)
        -> BackendFuture<'a>;
}
