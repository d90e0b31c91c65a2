// src/exec/context.rs

//! The handle task bodies use to run commands on the target.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::console::Console;
use crate::errors::{ProvisionError, Result};

use super::backend::{BackendError, ExecBackend, ExecResult};
use super::retry::RetryPolicy;

/// Timeout used by [`ExecutionContext::run_default`] unless overridden.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Upper bound for a single readiness probe.
const READY_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Commands are shortened to this many characters in log lines.
const PREVIEW_CHARS: usize = 80;

/// Shared flag that tells running commands to stop at their next
/// suspension point.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // We hold the sender, so this is unreachable; never resolve
            // rather than report a spurious cancellation.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

struct ContextInner {
    target: String,
    prelude: String,
    options: BTreeMap<String, String>,
    backend: Arc<dyn ExecBackend>,
    console: Console,
    retry: RetryPolicy,
    default_timeout: Duration,
}

/// Composes the environment prelude with caller commands and executes them
/// on the target through an [`ExecBackend`].
///
/// Cloning is cheap; all clones share the same backend and settings. Every
/// task body of a run receives its own clone.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
    cancel: CancelSignal,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("target", &self.inner.target)
            .field("options", &self.inner.options)
            .field("retry", &self.inner.retry)
            .field("default_timeout", &self.inner.default_timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ExecutionContext {
    pub fn builder(target: impl Into<String>, backend: Arc<dyn ExecBackend>) -> ContextBuilder {
        ContextBuilder::new(target, backend)
    }

    pub fn target(&self) -> &str {
        &self.inner.target
    }

    /// The exported-variable block prepended to every command.
    pub fn prelude(&self) -> &str {
        &self.inner.prelude
    }

    /// Configuration selector value fixed at construction (e.g. which
    /// optional component variant to install).
    pub fn option(&self, key: &str) -> Option<&str> {
        self.inner.options.get(key).map(String::as_str)
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.inner.options
    }

    pub fn console(&self) -> &Console {
        &self.inner.console
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout
    }

    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Same context, observing a different cancellation signal.
    pub fn with_cancel_signal(&self, cancel: CancelSignal) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel,
        }
    }

    /// Full script sent to the backend for `command`.
    pub fn compose(&self, command: &str) -> String {
        if self.inner.prelude.is_empty() {
            command.to_string()
        } else {
            format!("{}\n{}", self.inner.prelude, command)
        }
    }

    /// Run `command`, failing on a non-zero exit code.
    pub async fn run(&self, label: &str, command: &str, timeout: Duration) -> Result<ExecResult> {
        let (result, elapsed) = self.execute(label, command, timeout).await?;
        if result.success() {
            return Ok(result);
        }

        self.inner.console.always(format!(
            "[{label}] Command failed with exit code {} after {:.2}s: {}",
            result.exit_code,
            elapsed.as_secs_f64(),
            result.stderr.trim_end()
        ));
        Err(ProvisionError::CommandFailed {
            label: label.to_string(),
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            elapsed,
        })
    }

    /// [`run`](Self::run) with the context's default timeout.
    pub async fn run_default(&self, label: &str, command: &str) -> Result<ExecResult> {
        self.run(label, command, self.inner.default_timeout).await
    }

    /// Run `command` and return its result whatever the exit code.
    ///
    /// Transport retries, timeouts and cancellation behave as in
    /// [`run`](Self::run).
    pub async fn run_unchecked(
        &self,
        label: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecResult> {
        let (result, _elapsed) = self.execute(label, command, timeout).await?;
        Ok(result)
    }

    /// Poll the target with `echo ready` until it answers or `timeout`
    /// elapses. Probes are not retried; the polling loop is the retry.
    pub async fn wait_until_ready(&self, timeout: Duration, poll_interval: Duration) -> Result<()> {
        let label = "ready-check";
        // `None` when the timeout is too large to represent: poll until ready.
        let deadline = Instant::now().checked_add(timeout);
        let remaining = || match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        };
        self.inner
            .console
            .info(format!("Waiting for target {} to be ready...", self.inner.target));

        loop {
            let left = remaining();
            if left.is_zero() {
                return Err(ProvisionError::Timeout {
                    label: label.to_string(),
                    timeout,
                });
            }
            if self.cancel.is_cancelled() {
                return Err(ProvisionError::Cancelled {
                    label: label.to_string(),
                });
            }

            let probe_timeout = left.min(READY_PROBE_TIMEOUT);
            match self.attempt(&self.compose("echo ready"), probe_timeout).await {
                Ok(Ok(result)) if result.success() && result.stdout.contains("ready") => {
                    self.inner
                        .console
                        .info(format!("Target {} is ready", self.inner.target));
                    return Ok(());
                }
                Ok(Ok(result)) => {
                    debug!(exit_code = result.exit_code, "readiness probe not ready yet");
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "readiness probe failed");
                }
                Err(_) => {
                    debug!("readiness probe timed out");
                }
            }

            let pause = poll_interval.min(remaining());
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.cancel.cancelled() => {
                    return Err(ProvisionError::Cancelled { label: label.to_string() });
                }
            }
        }
    }

    /// One backend call guarded by a local timeout. The outer `Err` is the
    /// local timeout firing.
    async fn attempt(
        &self,
        script: &str,
        timeout: Duration,
    ) -> std::result::Result<std::result::Result<ExecResult, BackendError>, tokio::time::error::Elapsed>
    {
        let call = self.inner.backend.exec(&self.inner.target, script, timeout);
        tokio::time::timeout(timeout, call).await
    }

    /// Shared retry loop behind `run` and `run_unchecked`.
    async fn execute(
        &self,
        label: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<(ExecResult, Duration)> {
        let console = &self.inner.console;
        let retry = self.inner.retry;
        let script = self.compose(command);
        let started = Instant::now();

        console.info(format!("[{label}] Running: {}", preview(command)));

        let mut attempts: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ProvisionError::Cancelled {
                    label: label.to_string(),
                });
            }
            attempts += 1;

            let outcome = tokio::select! {
                res = self.attempt(&script, timeout) => res,
                _ = self.cancel.cancelled() => {
                    console.info(format!("[{label}] Cancelled while running"));
                    return Err(ProvisionError::Cancelled { label: label.to_string() });
                }
            };

            match outcome {
                Ok(Ok(result)) => {
                    self.log_result(label, &result);
                    return Ok((result, started.elapsed()));
                }
                Err(_) | Ok(Err(BackendError::TimedOut)) => {
                    console.always(format!(
                        "[{label}] Command timed out after {:.1}s",
                        timeout.as_secs_f64()
                    ));
                    return Err(ProvisionError::Timeout {
                        label: label.to_string(),
                        timeout,
                    });
                }
                Ok(Err(BackendError::LauncherExit { exit_code, message })) => {
                    console.always(format!(
                        "[{label}] Launcher exited with {exit_code}; not retrying since the command may have run: {message}"
                    ));
                    return Err(ProvisionError::Transport {
                        label: label.to_string(),
                        attempts,
                        message: format!("launcher exited with {exit_code}: {message}"),
                    });
                }
                Ok(Err(BackendError::Transport(message))) => {
                    if !retry.allows_retry(attempts) {
                        console.always(format!(
                            "[{label}] Transport failed after {attempts} attempt(s) ({:.2}s): {message}",
                            started.elapsed().as_secs_f64()
                        ));
                        return Err(ProvisionError::Transport {
                            label: label.to_string(),
                            attempts,
                            message,
                        });
                    }

                    let delay = retry.delay_for(attempts - 1);
                    warn!(
                        label = %label,
                        attempt = attempts,
                        max_attempts = retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "transport error; retrying"
                    );
                    console.info(format!(
                        "[{label}] Transport error (attempt {attempts}/{}): {message}; retrying in {:.2}s",
                        retry.max_attempts,
                        delay.as_secs_f64()
                    ));

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            return Err(ProvisionError::Cancelled { label: label.to_string() });
                        }
                    }
                }
            }
        }
    }

    fn log_result(&self, label: &str, result: &ExecResult) {
        let console = &self.inner.console;
        console.info(format!("[{label}] Exit code: {}", result.exit_code));
        if !result.stdout.trim().is_empty() {
            console.info(format!("[{label}] stdout:\n{}", result.stdout.trim_end()));
        }
        if !result.stderr.trim().is_empty() {
            console.info(format!("[{label}] stderr:\n{}", result.stderr.trim_end()));
        }
    }
}

/// Builder for [`ExecutionContext`].
pub struct ContextBuilder {
    target: String,
    backend: Arc<dyn ExecBackend>,
    env: Vec<(String, String)>,
    options: BTreeMap<String, String>,
    console: Console,
    retry: RetryPolicy,
    default_timeout: Duration,
}

impl ContextBuilder {
    fn new(target: impl Into<String>, backend: Arc<dyn ExecBackend>) -> Self {
        Self {
            target: target.into(),
            backend,
            env: Vec::new(),
            options: BTreeMap::new(),
            console: Console::default(),
            retry: RetryPolicy::default(),
            default_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Export `key=value` in the prelude of every command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options<I, K, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options
            .extend(options.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Validate variable names and assemble the context.
    pub fn build(self) -> Result<ExecutionContext> {
        let mut prelude = Vec::with_capacity(self.env.len());
        for (key, value) in &self.env {
            if !is_valid_env_name(key) {
                return Err(ProvisionError::ConfigError(format!(
                    "invalid environment variable name '{key}'"
                )));
            }
            prelude.push(format!("export {key}={}", shell_quote(value)));
        }

        Ok(ExecutionContext {
            inner: Arc::new(ContextInner {
                target: self.target,
                prelude: prelude.join("\n"),
                options: self.options,
                backend: self.backend,
                console: self.console,
                retry: self.retry,
                default_timeout: self.default_timeout,
            }),
            cancel: CancelSignal::new(),
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Single-quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn preview(command: &str) -> String {
    let flat = command.trim().replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
