// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod timings;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{build_registry, load_and_validate, PlanFile};
use crate::console::Console;
use crate::dag::Scheduler;
use crate::exec::{ExecBackend, ExecutionContext};
use crate::timings::TimingsCollector;

pub use crate::dag::{RunReport, SchedulerOptions, TaskRegistry};
pub use crate::errors::{ErrorKind, ProvisionError};
pub use crate::exec::{ExecResult, RetryPolicy};

/// Interval between readiness probes.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading
/// - registry construction
/// - execution backend + context
/// - readiness check
/// - scheduler run and timing report
pub async fn run(args: CliArgs) -> Result<()> {
    let plan = load_and_validate(&args.plan)
        .with_context(|| format!("loading plan '{}'", args.plan))?;
    let registry = build_registry(&plan)?;

    if args.print_graph {
        print!("{}", registry.render_dependency_graph());
        return Ok(());
    }

    let console = Console::new(args.verbose);
    let target = args
        .target
        .clone()
        .or_else(|| plan.target.id.clone())
        .context("no target: set [target].id in the plan or pass --target")?;

    let backend: Arc<dyn ExecBackend> = Arc::new(plan.target.backend());
    let ctx = build_context(&plan, &args, target, backend, console.clone())?;

    if !args.skip_ready_check {
        ctx.wait_until_ready(plan.target.ready_timeout(), READY_POLL_INTERVAL)
            .await?;
    }

    let timings = TimingsCollector::new();
    let report = run_registry(
        &registry,
        ctx,
        timings.clone(),
        console.clone(),
        plan.run.scheduler_options(),
    )
    .await;

    for line in timings.render() {
        console.always(line);
    }

    let report = report?;
    console.always(format!(
        "Provisioned {} task(s) in {} layer(s) ({:.2}s)",
        report.completed.len(),
        report.layers.len(),
        report.elapsed.as_secs_f64()
    ));
    Ok(())
}

/// Run an already-built registry to completion.
///
/// Library callers that register their own task bodies use this instead of
/// [`run`].
pub async fn run_registry(
    registry: &TaskRegistry,
    ctx: ExecutionContext,
    timings: TimingsCollector,
    console: Console,
    options: SchedulerOptions,
) -> std::result::Result<RunReport, ProvisionError> {
    info!(target_id = %ctx.target(), tasks = registry.len(), "provisioning target");
    let mut scheduler = Scheduler::new(registry, ctx, timings, console).with_options(options);
    scheduler.run().await
}

fn build_context(
    plan: &PlanFile,
    args: &CliArgs,
    target: String,
    backend: Arc<dyn ExecBackend>,
    console: Console,
) -> Result<ExecutionContext> {
    let mut options = plan.options.clone();
    for (key, value) in &args.options {
        options.insert(key.clone(), value.clone());
    }
    debug!(?options, "configuration selectors");

    let ctx = ExecutionContext::builder(target, backend)
        .envs(plan.env.clone())
        .options(options)
        .console(console)
        .retry(plan.retry.policy())
        .default_timeout(plan.run.default_timeout())
        .build()?;
    Ok(ctx)
}
