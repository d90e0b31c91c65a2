// tests/execution_context.rs

mod common;
use crate::common::{fake_context, fast_retry, init_tracing, lines_contain, TestResult};

use std::sync::Arc;
use std::time::Duration;

use provdag::console::Console;
use provdag::errors::{ErrorKind, ProvisionError};
use provdag::exec::{CancelSignal, ExecutionContext, RetryPolicy};
use provdag_test_utils::fake_backend::{FakeBackend, FakeResponse};
use provdag_test_utils::with_timeout;

const FIVE_SECS: Duration = Duration::from_secs(5);

#[tokio::test]
async fn transport_failures_are_retried_until_success() -> TestResult {
    init_tracing();

    let backend = FakeBackend::failing_transport_times(2);
    let (ctx, lines) = fake_context(backend.clone());

    let result = with_timeout(ctx.run("install", "echo hi", FIVE_SECS)).await?;
    assert!(result.success());
    assert_eq!(backend.call_count(), 3);

    // Every attempt sends the same script.
    let calls = backend.calls();
    assert!(calls.iter().all(|c| c == "echo hi"));

    assert!(lines_contain(&lines, "[install] Transport error (attempt 1/3)"));
    assert!(lines_contain(&lines, "[install] Transport error (attempt 2/3)"));
    Ok(())
}

#[tokio::test]
async fn transport_failure_past_the_ceiling_is_reported_with_attempt_count() -> TestResult {
    init_tracing();

    let backend = FakeBackend::always_failing_transport();
    let (ctx, lines) = fake_context(backend.clone());

    let err = with_timeout(ctx.run("install", "echo hi", FIVE_SECS))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    match err {
        ProvisionError::Transport {
            label,
            attempts,
            message,
        } => {
            assert_eq!(label, "install");
            assert_eq!(attempts, 3);
            assert_eq!(message, "connection refused");
        }
        other => panic!("expected Transport, got {other:?}"),
    }
    assert_eq!(backend.call_count(), 3);
    assert!(lines_contain(&lines, "[install] Transport failed after 3 attempt(s)"));
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_fails_without_retry() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding()
        .with_fallback(FakeResponse::exit(2, "partial output", "npm ERR! missing script"));
    let (ctx, lines) = fake_context(backend.clone());

    let err = with_timeout(ctx.run("build", "npm run build", FIVE_SECS))
        .await
        .unwrap_err();
    match err {
        ProvisionError::CommandFailed {
            ref label,
            exit_code,
            ref stdout,
            ref stderr,
            ..
        } => {
            assert_eq!(label, "build");
            assert_eq!(exit_code, 2);
            assert_eq!(stdout, "partial output");
            assert_eq!(stderr, "npm ERR! missing script");
        }
        ref other => panic!("expected CommandFailed, got {other:?}"),
    }

    let text = err.to_string();
    assert!(text.contains("exited with code 2"));
    assert!(text.contains("npm ERR! missing script"));

    assert_eq!(backend.call_count(), 1);
    assert!(lines_contain(&lines, "[build] Command failed with exit code 2"));
    Ok(())
}

#[tokio::test]
async fn hanging_command_times_out_once() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding().with_fallback(FakeResponse::Hang);
    let (ctx, _lines) = fake_context(backend.clone());

    let err = with_timeout(ctx.run("stuck", "sleep 1000", Duration::from_millis(50)))
        .await
        .unwrap_err();
    match err {
        ProvisionError::Timeout { label, timeout } => {
            assert_eq!(label, "stuck");
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert_eq!(backend.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn backend_reported_timeout_is_not_retried() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding().with_fallback(FakeResponse::TimedOut);
    let (ctx, _lines) = fake_context(backend.clone());

    let err = with_timeout(ctx.run_unchecked("slow", "make", FIVE_SECS))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(backend.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn prelude_exports_are_prepended_and_quoted() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding();
    let ctx = ExecutionContext::builder("ct-100", Arc::new(backend.clone()))
        .env("NODE_VERSION", "22")
        .env("GREETING", "it's here")
        .console(Console::capturing(false).0)
        .build()?;

    assert_eq!(
        ctx.prelude(),
        "export NODE_VERSION='22'\nexport GREETING='it'\\''s here'"
    );

    ctx.run("node", "node --version", FIVE_SECS).await?;
    assert_eq!(
        backend.calls(),
        vec!["export NODE_VERSION='22'\nexport GREETING='it'\\''s here'\nnode --version".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn context_without_env_sends_command_verbatim() -> TestResult {
    let backend = FakeBackend::succeeding();
    let (ctx, _lines) = fake_context(backend.clone());

    assert_eq!(ctx.prelude(), "");
    assert_eq!(ctx.compose("uname -a"), "uname -a");
    ctx.run_default("uname", "uname -a").await?;
    assert_eq!(backend.calls(), vec!["uname -a".to_string()]);
    Ok(())
}

#[test]
fn invalid_environment_name_is_rejected() {
    let result = ExecutionContext::builder("ct-100", Arc::new(FakeBackend::succeeding()))
        .env("NOT-VALID", "x")
        .build();

    match result {
        Err(ProvisionError::ConfigError(message)) => assert!(message.contains("NOT-VALID")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[tokio::test]
async fn run_unchecked_returns_failing_result() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding().with_rule(
        "systemctl is-active",
        FakeResponse::exit(3, "inactive\n", ""),
    );
    let (ctx, _lines) = fake_context(backend);

    let result = ctx
        .run_unchecked("status", "systemctl is-active code-server", FIVE_SECS)
        .await?;
    assert!(!result.success());
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stdout, "inactive\n");
    Ok(())
}

#[test]
fn options_are_readable_from_every_clone() -> TestResult {
    let ctx = ExecutionContext::builder("ct-100", Arc::new(FakeBackend::succeeding()))
        .option("ide", "vscode")
        .options([("shell", "zsh")])
        .build()?;
    let clone = ctx.clone();

    assert_eq!(clone.option("ide"), Some("vscode"));
    assert_eq!(clone.option("shell"), Some("zsh"));
    assert_eq!(clone.option("missing"), None);
    assert_eq!(clone.options().len(), 2);
    assert_eq!(clone.target(), "ct-100");
    Ok(())
}

#[tokio::test]
async fn verbose_console_logs_command_and_output() -> TestResult {
    let backend = FakeBackend::succeeding().with_fallback(FakeResponse::ok("v22.1.0\n"));
    let (ctx, lines) = fake_context(backend);
    assert!(ctx.console().is_verbose());

    ctx.run("node", "node --version", FIVE_SECS).await?;

    let lines = lines.lock().unwrap().clone();
    assert_eq!(
        lines,
        vec![
            "[INFO] [node] Running: node --version".to_string(),
            "[INFO] [node] Exit code: 0".to_string(),
            "[INFO] [node] stdout:\nv22.1.0".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn quiet_console_suppresses_progress_but_not_failures() -> TestResult {
    let backend = FakeBackend::succeeding()
        .with_rule("false", FakeResponse::exit(1, "", "nope"));
    let (console, lines) = Console::capturing(false);
    let ctx = ExecutionContext::builder("ct-100", Arc::new(backend))
        .console(console)
        .retry(fast_retry())
        .build()?;

    ctx.run("ok", "true", FIVE_SECS).await?;
    assert!(lines.lock().unwrap().is_empty());

    assert!(ctx.run("bad", "false", FIVE_SECS).await.is_err());
    let lines = lines.lock().unwrap().clone();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[bad] Command failed with exit code 1"));
    assert!(!lines[0].starts_with("[INFO]"));
    Ok(())
}

#[tokio::test]
async fn long_commands_are_shortened_in_the_log() -> TestResult {
    let backend = FakeBackend::succeeding();
    let (ctx, lines) = fake_context(backend);

    let command = format!("echo {}", "x".repeat(200));
    ctx.run("long", &command, FIVE_SECS).await?;

    let first = lines.lock().unwrap()[0].clone();
    let shown = first.trim_start_matches("[INFO] [long] Running: ");
    assert!(shown.ends_with("..."));
    assert_eq!(shown.chars().count(), 83);
    Ok(())
}

#[tokio::test]
async fn wait_until_ready_polls_until_the_target_answers() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding().with_fallback(FakeResponse::ok("ready\n"));
    backend.push(FakeResponse::transport("container not running"));
    backend.push(FakeResponse::exit(1, "", "not yet"));
    let (ctx, lines) = fake_context(backend.clone());

    with_timeout(ctx.wait_until_ready(Duration::from_secs(2), Duration::from_millis(10))).await?;

    assert_eq!(backend.call_count(), 3);
    assert!(lines_contain(&lines, "Target ct-100 is ready"));
    Ok(())
}

#[tokio::test]
async fn wait_until_ready_gives_up_after_its_timeout() -> TestResult {
    init_tracing();

    let backend = FakeBackend::always_failing_transport();
    let (ctx, _lines) = fake_context(backend.clone());

    let err = with_timeout(ctx.wait_until_ready(
        Duration::from_millis(100),
        Duration::from_millis(20),
    ))
    .await
    .unwrap_err();

    match err {
        ProvisionError::Timeout { label, .. } => assert_eq!(label, "ready-check"),
        other => panic!("expected Timeout, got {other:?}"),
    }
    assert!(backend.call_count() >= 2);
    Ok(())
}

#[tokio::test]
async fn wait_until_ready_accepts_an_unbounded_timeout() -> TestResult {
    init_tracing();

    let backend = FakeBackend::succeeding().with_fallback(FakeResponse::ok("ready\n"));
    backend.push(FakeResponse::exit(1, "", "booting"));
    let (ctx, _lines) = fake_context(backend.clone());

    with_timeout(ctx.wait_until_ready(Duration::MAX, Duration::from_millis(10))).await?;
    assert_eq!(backend.call_count(), 2);
    Ok(())
}

#[test]
fn default_console_is_quiet() -> TestResult {
    let ctx = ExecutionContext::builder("ct-100", Arc::new(FakeBackend::succeeding())).build()?;
    assert!(!ctx.console().is_verbose());
    Ok(())
}

#[tokio::test]
async fn cancellation_during_backoff_stops_retrying() -> TestResult {
    init_tracing();

    let backend = FakeBackend::always_failing_transport();
    let ctx = ExecutionContext::builder("ct-100", Arc::new(backend.clone()))
        .console(Console::capturing(false).0)
        .retry(RetryPolicy::new(5, Duration::from_secs(10)))
        .build()?;

    let signal = CancelSignal::new();
    let ctx = ctx.with_cancel_signal(signal.clone());

    let running = tokio::spawn({
        let ctx = ctx.clone();
        async move { ctx.run("install", "apt-get update", FIVE_SECS).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    signal.cancel();

    let result = with_timeout(running).await?;
    match result {
        Err(ProvisionError::Cancelled { label }) => assert_eq!(label, "install"),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(backend.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_context_refuses_new_commands() -> TestResult {
    let backend = FakeBackend::succeeding();
    let (ctx, _lines) = fake_context(backend.clone());
    let ctx = ctx.with_cancel_signal(CancelSignal::new());
    ctx.cancel_signal().cancel();

    let err = ctx.run("late", "true", FIVE_SECS).await.unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(backend.call_count(), 0);
    Ok(())
}

#[test]
fn backoff_doubles_up_to_the_cap() {
    let policy = RetryPolicy::new(5, Duration::from_millis(100));

    let delays: Vec<Duration> = (0..4).map(|n| policy.delay_for(n)).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(400),
            Duration::from_millis(400),
        ]
    );

    assert!(policy.allows_retry(4));
    assert!(!policy.allows_retry(5));
}

#[test]
fn retry_policy_keeps_at_least_one_attempt() {
    let policy = RetryPolicy::new(0, Duration::from_millis(10));
    assert_eq!(policy.max_attempts, 1);
    assert!(!policy.allows_retry(1));

    let custom = RetryPolicy::new(3, Duration::from_millis(10)).with_max_delay(Duration::from_secs(1));
    assert_eq!(custom.delay_for(3), Duration::from_millis(80));
    assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
}
