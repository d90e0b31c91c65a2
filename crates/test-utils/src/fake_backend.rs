use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use provdag::exec::{BackendError, BackendFuture, ExecBackend, ExecResult};

/// Scripted outcome of one backend call.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// The command ran and exited with `code`.
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    /// The channel to the target failed.
    Transport(String),
    /// The backend itself reports a timeout.
    TimedOut,
    /// Never completes; only a timeout or cancellation ends the call.
    Hang,
}

impl FakeResponse {
    pub fn ok(stdout: &str) -> Self {
        FakeResponse::Exit {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn exit(code: i32, stdout: &str, stderr: &str) -> Self {
        FakeResponse::Exit {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub fn transport(message: &str) -> Self {
        FakeResponse::Transport(message.to_string())
    }
}

#[derive(Debug, Default)]
struct State {
    /// Responses consumed in order, before rules and fallback.
    queue: VecDeque<FakeResponse>,
    /// `(substring, response)`: first rule whose substring occurs in the
    /// script wins. Rules are not consumed.
    rules: Vec<(String, FakeResponse)>,
    calls: Vec<String>,
}

/// A fake execution backend that:
/// - records every script it was asked to run
/// - answers from a queue of scripted responses, then from substring rules,
///   then with a fallback (success with empty output by default)
/// - optionally sleeps before answering, to simulate a slow target
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    fallback: FakeResponse,
    delay: Duration,
}

impl FakeBackend {
    /// Every call succeeds with empty output.
    pub fn succeeding() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            fallback: FakeResponse::ok(""),
            delay: Duration::ZERO,
        }
    }

    /// The first `n` calls fail at the transport level, the rest succeed.
    pub fn failing_transport_times(n: usize) -> Self {
        let backend = Self::succeeding();
        for i in 0..n {
            backend.push(FakeResponse::transport(&format!("connection reset ({})", i + 1)));
        }
        backend
    }

    /// Every call fails at the transport level.
    pub fn always_failing_transport() -> Self {
        Self::succeeding().with_fallback(FakeResponse::transport("connection refused"))
    }

    pub fn with_fallback(mut self, fallback: FakeResponse) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer calls whose script contains `pattern` with `response`.
    pub fn with_rule(self, pattern: &str, response: FakeResponse) -> Self {
        {
            let mut guard = self.state.lock().unwrap();
            guard.rules.push((pattern.to_string(), response));
        }
        self
    }

    /// Queue a one-shot response.
    pub fn push(&self, response: FakeResponse) {
        let mut guard = self.state.lock().unwrap();
        guard.queue.push_back(response);
    }

    /// Scripts received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn next_response(&self, script: &str) -> FakeResponse {
        let mut guard = self.state.lock().unwrap();
        guard.calls.push(script.to_string());

        if let Some(response) = guard.queue.pop_front() {
            return response;
        }
        guard
            .rules
            .iter()
            .find(|(pattern, _)| script.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl ExecBackend for FakeBackend {
    fn exec<'a>(
        &'a self,
        _target: &'a str,
        script: &'a str,
        _timeout: Duration,
    ) -> BackendFuture<'a> {
        let response = self.next_response(script);
        let delay = self.delay;

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match response {
                FakeResponse::Exit {
                    code,
                    stdout,
                    stderr,
                } => Ok(ExecResult {
                    exit_code: code,
                    stdout,
                    stderr,
                }),
                FakeResponse::Transport(message) => Err(BackendError::Transport(message)),
                FakeResponse::TimedOut => Err(BackendError::TimedOut),
                FakeResponse::Hang => {
                    std::future::pending::<()>().await;
                    Err(BackendError::TimedOut)
                }
            }
        })
    }
}
