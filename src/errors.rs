// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Every run-time variant carries enough context (label, captured output,
//! elapsed time) for a failure to be diagnosable from logs alone.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("dependencies can never be satisfied for: {stuck}", stuck = .stuck.join(", "))]
    Unsatisfiable { stuck: Vec<String> },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("cycle detected in task graph involving: {tasks}", tasks = .tasks.join(", "))]
    DependencyCycle { tasks: Vec<String> },

    #[error("[{label}] transport failed after {attempts} attempt(s): {message}")]
    Transport {
        label: String,
        attempts: u32,
        message: String,
    },

    #[error(
        "[{label}] command exited with code {exit_code} after {secs:.2}s\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}",
        secs = .elapsed.as_secs_f64()
    )]
    CommandFailed {
        label: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },

    #[error("[{label}] command timed out after {secs:.1}s", secs = .timeout.as_secs_f64())]
    Timeout { label: String, timeout: Duration },

    #[error("[{label}] cancelled after a sibling task failed")]
    Cancelled { label: String },

    #[error("task '{task}' panicked")]
    TaskPanicked { task: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of [`ProvisionError`] for callers that only care
/// about the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Registration,
    Dependency,
    Transport,
    TaskExecution,
    Timeout,
    Cancelled,
    Panicked,
    Config,
    Other,
}

impl ProvisionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProvisionError::DuplicateTask(_) => ErrorKind::Registration,
            ProvisionError::Unsatisfiable { .. }
            | ProvisionError::UnknownDependency { .. }
            | ProvisionError::DependencyCycle { .. } => ErrorKind::Dependency,
            ProvisionError::Transport { .. } => ErrorKind::Transport,
            ProvisionError::CommandFailed { .. } => ErrorKind::TaskExecution,
            ProvisionError::Timeout { .. } => ErrorKind::Timeout,
            ProvisionError::Cancelled { .. } => ErrorKind::Cancelled,
            ProvisionError::TaskPanicked { .. } => ErrorKind::Panicked,
            ProvisionError::ConfigError(_) | ProvisionError::TomlError(_) => ErrorKind::Config,
            ProvisionError::IoError(_) | ProvisionError::Other(_) => ErrorKind::Other,
        }
    }

    /// True for the error produced when a running task observed the shared
    /// cancellation signal rather than failing on its own.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProvisionError::Cancelled { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProvisionError>;
