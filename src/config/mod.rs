// src/config/mod.rs

//! Provisioning plan loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate basic invariants like graph correctness (`validate.rs`).
//! - Turn a validated plan into a `TaskRegistry` (`tasks.rs`).

pub mod loader;
pub mod model;
pub mod tasks;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_plan};
pub use model::{
    LauncherSpec, PlanFile, RawPlanFile, RetrySection, RunSection, TargetSection, TaskConfig,
};
pub use tasks::build_registry;
