// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`registry`] holds the named tasks and their declared dependencies.
//! - [`layers`] computes ready sets; shared by the scheduler and the
//!   dependency-graph renderer so both agree on layer boundaries.
//! - [`validate`] performs eager graph validation with `petgraph`.
//! - [`scheduler`] runs a registry layer by layer.
//! - [`task_info`] defines the per-run task state machine.
//! - [`report`] defines the result of a run.

pub mod layers;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod task_info;
pub mod validate;

pub use layers::{plan_layers, LayerPlan};
pub use registry::{Task, TaskBody, TaskFuture, TaskRegistry};
pub use report::RunReport;
pub use scheduler::{Scheduler, SchedulerOptions};
pub use task_info::TaskRunState;
