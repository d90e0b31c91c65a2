// src/exec/mod.rs

//! Remote command execution layer.
//!
//! - [`backend`] defines the `ExecBackend` trait and the `ExecResult` /
//!   `BackendError` types a backend produces.
//! - [`command`] provides `CommandBackend`, which reaches the target through a
//!   local launcher process (`pct exec`, `ssh`, `sh`).
//! - [`context`] owns `ExecutionContext`: prelude composition, timeouts,
//!   retries and cooperative cancellation.
//! - [`retry`] holds the bounded exponential backoff policy.

pub mod backend;
pub mod command;
pub mod context;
pub mod retry;

pub use backend::{BackendError, BackendFuture, ExecBackend, ExecResult};
pub use command::{CommandBackend, ScriptDelivery};
pub use context::{CancelSignal, ContextBuilder, ExecutionContext};
pub use retry::RetryPolicy;
