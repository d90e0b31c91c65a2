// src/dag/registry.rs

//! Named tasks and their declared dependency edges.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::dag::layers::plan_layers;
use crate::dag::validate::check_dependencies;
use crate::errors::{ProvisionError, Result};
use crate::exec::ExecutionContext;
use crate::types::TaskName;

pub type TaskFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Type-erased task body.
pub type TaskBody = Arc<dyn Fn(ExecutionContext) -> TaskFuture + Send + Sync>;

/// A named unit of provisioning work.
#[derive(Clone)]
pub struct Task {
    name: TaskName,
    dependencies: Vec<TaskName>,
    description: String,
    body: TaskBody,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct dependencies, in declaration order, without duplicates.
    pub fn dependencies(&self) -> &[TaskName] {
        &self.dependencies
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Start the body with its own handle onto the execution context.
    pub fn invoke(&self, ctx: ExecutionContext) -> TaskFuture {
        (self.body)(ctx)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The set of tasks for one scheduling run.
///
/// Registration order carries no scheduling meaning; it only makes listings
/// and layer contents deterministic.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskName, Task>,
    order: Vec<TaskName>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    ///
    /// Fails if `name` is already taken. Dependencies are stored as declared;
    /// names that are never registered surface when the graph is scheduled
    /// (or earlier via [`validate`](Self::validate)).
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<TaskName>,
        dependencies: &[&str],
        body: F,
        description: impl Into<String>,
    ) -> Result<()>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(ProvisionError::DuplicateTask(name));
        }

        let mut deps: Vec<TaskName> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.iter().any(|d| d.as_str() == *dep) {
                deps.push((*dep).to_string());
            }
        }

        let body: TaskBody =
            Arc::new(move |ctx: ExecutionContext| -> TaskFuture { Box::pin(body(ctx)) });
        let task = Task {
            name: name.clone(),
            dependencies: deps,
            description: description.into(),
            body,
        };

        self.order.push(name.clone());
        self.tasks.insert(name, task);
        Ok(())
    }

    /// [`register`](Self::register) without a description.
    pub fn add<F, Fut>(
        &mut self,
        name: impl Into<TaskName>,
        dependencies: &[&str],
        body: F,
    ) -> Result<()>
    where
        F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(name, dependencies, body, String::new())
    }

    /// All tasks, in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|name| self.tasks.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Eagerly reject dependencies on unregistered names and cycles.
    pub fn validate(&self) -> Result<()> {
        check_dependencies(self.tasks().map(|t| (t.name(), t.dependencies())))
    }

    /// Text listing of the layers a fully successful run would execute.
    ///
    /// Each line names a task, its direct dependencies and its description.
    /// Tasks that could never run are listed last. No body is invoked.
    pub fn render_dependency_graph(&self) -> String {
        let plan = plan_layers(self);
        let mut out = String::new();

        let _ = writeln!(out, "Task dependency graph ({} tasks):", self.len());
        for (idx, layer) in plan.layers.iter().enumerate() {
            let _ = writeln!(out, "Layer {}:", idx + 1);
            for name in layer {
                self.render_task_line(&mut out, name);
            }
        }

        if !plan.unresolved.is_empty() {
            let _ = writeln!(out, "Unresolved (dependencies never satisfied):");
            for name in &plan.unresolved {
                self.render_task_line(&mut out, name);
            }
        }

        out
    }

    fn render_task_line(&self, out: &mut String, name: &str) {
        let Some(task) = self.get(name) else {
            return;
        };

        let _ = write!(out, "  - {name}");
        if !task.dependencies.is_empty() {
            let deps: Vec<String> = task
                .dependencies
                .iter()
                .map(|d| {
                    if self.contains(d) {
                        d.clone()
                    } else {
                        format!("{d} (missing)")
                    }
                })
                .collect();
            let _ = write!(out, " <- {}", deps.join(", "));
        }
        if !task.description.is_empty() {
            let _ = write!(out, "  # {}", task.description);
        }
        out.push('\n');
    }
}
