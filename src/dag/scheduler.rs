// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::console::Console;
use crate::dag::layers::ready_layer;
use crate::dag::registry::TaskRegistry;
use crate::dag::report::{LayerOutcome, RunReport};
use crate::dag::task_info::TaskRunState;
use crate::errors::{ProvisionError, Result};
use crate::exec::{CancelSignal, ExecutionContext};
use crate::timings::TimingsCollector;
use crate::types::TaskName;

/// Behaviour switches for a [`Scheduler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// When a task fails, signal its still-running siblings to stop at their
    /// next suspension point instead of letting them finish.
    pub cancel_siblings_on_failure: bool,
    /// Reject unknown dependencies and cycles before the first layer with a
    /// specific error, instead of the generic unsatisfiable report.
    pub validate_dependencies: bool,
}

/// Layered barrier scheduler.
///
/// Each iteration computes the set of tasks whose dependencies have all
/// completed, runs that layer concurrently, and waits for every task in it
/// before looking at the graph again. A failure stops the run once the
/// current layer has drained.
#[derive(Debug)]
pub struct Scheduler<'r> {
    registry: &'r TaskRegistry,
    ctx: ExecutionContext,
    timings: TimingsCollector,
    console: Console,
    options: SchedulerOptions,
    states: HashMap<TaskName, TaskRunState>,
    /// Completion order of successful tasks.
    completed: Vec<TaskName>,
    layers: Vec<Vec<TaskName>>,
}

impl<'r> Scheduler<'r> {
    pub fn new(
        registry: &'r TaskRegistry,
        ctx: ExecutionContext,
        timings: TimingsCollector,
        console: Console,
    ) -> Self {
        let states = registry
            .names()
            .map(|name| (name.to_string(), TaskRunState::Pending))
            .collect();

        Self {
            registry,
            ctx,
            timings,
            console,
            options: SchedulerOptions::default(),
            states,
            completed: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    /// State of `task` in the current (or last) run.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        self.states.get(task).copied()
    }

    /// Successfully completed tasks, in completion order.
    pub fn completed(&self) -> &[TaskName] {
        &self.completed
    }

    /// Layers executed so far, including a layer that failed.
    pub fn layers(&self) -> &[Vec<TaskName>] {
        &self.layers
    }

    /// Run the whole graph.
    pub async fn run(&mut self) -> Result<RunReport> {
        self.reset();

        if self.options.validate_dependencies {
            self.registry.validate()?;
        }

        let started = Instant::now();
        // Fresh signal per run so a cancelled run never leaks into the next.
        let run_ctx = self.ctx.with_cancel_signal(CancelSignal::new());

        let mut remaining: HashSet<TaskName> =
            self.registry.names().map(str::to_string).collect();
        let mut completed: HashSet<TaskName> = HashSet::new();

        info!(tasks = remaining.len(), "scheduler: starting run");

        while !remaining.is_empty() {
            let ready = ready_layer(self.registry, &remaining, &completed);

            if ready.is_empty() {
                let stuck: Vec<TaskName> = self
                    .registry
                    .names()
                    .filter(|name| remaining.contains(*name))
                    .map(str::to_string)
                    .collect();
                warn!(?stuck, "scheduler: no task is ready; graph cannot progress");
                self.console.always(format!(
                    "Dependency graph cannot progress; stuck tasks: {}",
                    stuck.join(", ")
                ));
                return Err(ProvisionError::Unsatisfiable { stuck });
            }

            let outcome = self.run_layer(&ready, &run_ctx).await;

            for name in outcome.succeeded {
                remaining.remove(&name);
                completed.insert(name.clone());
                self.completed.push(name);
            }
            self.layers.push(ready);

            if let Some(err) = outcome.failure {
                warn!(
                    layer = self.layers.len(),
                    error = %err,
                    "scheduler: layer failed; aborting run"
                );
                return Err(err);
            }
        }

        let elapsed = started.elapsed();
        info!(
            layers = self.layers.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scheduler: run finished"
        );

        Ok(RunReport {
            layers: self.layers.clone(),
            completed: self.completed.clone(),
            elapsed,
        })
    }

    fn reset(&mut self) {
        for state in self.states.values_mut() {
            *state = TaskRunState::Pending;
        }
        self.completed.clear();
        self.layers.clear();
    }

    fn set_state(&mut self, task: &str, state: TaskRunState) {
        if let Some(slot) = self.states.get_mut(task) {
            *slot = state;
        }
    }

    /// Fan out one layer and wait for every task in it.
    async fn run_layer(&mut self, ready: &[TaskName], ctx: &ExecutionContext) -> LayerOutcome {
        let layer_no = self.layers.len() + 1;
        let layer_label = format!("layer:{}", ready.join("+"));
        let layer_started = Instant::now();

        debug!(layer = layer_no, tasks = ?ready, "scheduler: starting layer");
        self.console
            .info(format!("Layer {layer_no}: running {}", ready.join(", ")));

        let mut set: JoinSet<(TaskName, Result<()>, Duration)> = JoinSet::new();

        for name in ready {
            self.set_state(name, TaskRunState::Ready);
            let Some(task) = self.registry.get(name).cloned() else {
                continue;
            };

            let ctx = ctx.clone();
            let timings = self.timings.clone();
            self.set_state(name, TaskRunState::Running);

            set.spawn(async move {
                let name = task.name().to_string();
                let started = Instant::now();

                // Run the body on its own task so a panic surfaces as a
                // JoinError here instead of tearing down the layer.
                let result = match tokio::spawn(task.invoke(ctx)).await {
                    Ok(result) => result,
                    Err(join_err) if join_err.is_panic() => Err(ProvisionError::TaskPanicked {
                        task: name.clone(),
                    }),
                    Err(join_err) => Err(ProvisionError::Other(join_err.into())),
                };

                let elapsed = started.elapsed();
                timings.record(format!("task:{name}"), elapsed);
                (name, result, elapsed)
            });
        }

        let mut succeeded = Vec::with_capacity(ready.len());
        let mut failure: Option<ProvisionError> = None;

        while let Some(joined) = set.join_next().await {
            let (name, result, elapsed) = match joined {
                Ok(done) => done,
                Err(join_err) => {
                    // The wrapper above never panics; treat anything else as
                    // an anonymous failure of the layer.
                    warn!(error = %join_err, "scheduler: task wrapper did not complete");
                    failure.get_or_insert(ProvisionError::Other(join_err.into()));
                    continue;
                }
            };

            match result {
                Ok(()) => {
                    debug!(task = %name, elapsed_ms = elapsed.as_millis() as u64, "task succeeded");
                    self.console
                        .info(format!("Task {name} finished in {:.2}s", elapsed.as_secs_f64()));
                    self.set_state(&name, TaskRunState::Succeeded);
                    succeeded.push(name);
                }
                Err(err) if err.is_cancellation() => {
                    debug!(task = %name, "task stopped after cancellation");
                    self.set_state(&name, TaskRunState::Cancelled);
                    failure.get_or_insert(err);
                }
                Err(err) => {
                    warn!(task = %name, error = %err, "task failed");
                    self.console.always(format!(
                        "Task {name} failed after {:.2}s: {err}",
                        elapsed.as_secs_f64()
                    ));
                    self.set_state(&name, TaskRunState::Failed);

                    if self.options.cancel_siblings_on_failure {
                        ctx.cancel_signal().cancel();
                    }

                    failure = match failure {
                        Some(prev) if !prev.is_cancellation() => Some(prev),
                        _ => Some(err),
                    };
                }
            }
        }

        self.timings.record(layer_label, layer_started.elapsed());
        debug!(
            layer = layer_no,
            succeeded = succeeded.len(),
            failed = failure.is_some(),
            "scheduler: layer barrier resolved"
        );

        LayerOutcome { succeeded, failure }
    }
}
