#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use provdag::console::Console;
use provdag::dag::TaskFuture;
use provdag::errors::ProvisionError;
use provdag::exec::{ExecutionContext, RetryPolicy};
use provdag_test_utils::fake_backend::FakeBackend;

pub use provdag_test_utils::init_tracing;

pub type TestResult = Result<(), Box<dyn Error>>;

/// Shared log of task names, in the order their bodies ran.
pub type Spy = Arc<Mutex<Vec<String>>>;

pub fn spy() -> Spy {
    Arc::new(Mutex::new(Vec::new()))
}

/// Three attempts with millisecond backoff so retry tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(5))
}

/// Context over `backend` with a capturing, verbose console.
pub fn fake_context(backend: FakeBackend) -> (ExecutionContext, Arc<Mutex<Vec<String>>>) {
    let (console, lines) = Console::capturing(true);
    let ctx = ExecutionContext::builder("ct-100", Arc::new(backend))
        .console(console)
        .retry(fast_retry())
        .build()
        .expect("valid context");
    (ctx, lines)
}

/// Body that appends `name` to `spy` and succeeds.
pub fn record(
    spy: &Spy,
    name: &str,
) -> impl Fn(ExecutionContext) -> TaskFuture + Send + Sync + 'static {
    let spy = Arc::clone(spy);
    let name = name.to_string();
    move |_ctx: ExecutionContext| -> TaskFuture {
        let spy = Arc::clone(&spy);
        let name = name.clone();
        Box::pin(async move {
            spy.lock().unwrap().push(name);
            Ok::<(), ProvisionError>(())
        })
    }
}

/// Body that runs `cmd` on the context under label `name`.
pub fn remote(
    name: &str,
    cmd: &str,
) -> impl Fn(ExecutionContext) -> TaskFuture + Send + Sync + 'static {
    let name = name.to_string();
    let cmd = cmd.to_string();
    move |ctx: ExecutionContext| -> TaskFuture {
        let name = name.clone();
        let cmd = cmd.clone();
        Box::pin(async move {
            ctx.run(&name, &cmd, Duration::from_secs(5)).await?;
            Ok::<(), ProvisionError>(())
        })
    }
}

pub fn lines_contain(lines: &Arc<Mutex<Vec<String>>>, needle: &str) -> bool {
    lines.lock().unwrap().iter().any(|l| l.contains(needle))
}
