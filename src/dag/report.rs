// src/dag/report.rs

//! Result types for a scheduling run.

use std::time::Duration;

use crate::errors::ProvisionError;
use crate::types::TaskName;

/// Summary of a run that completed the whole graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Task names per executed layer, in execution order.
    pub layers: Vec<Vec<TaskName>>,
    /// Every task, in the order it completed.
    pub completed: Vec<TaskName>,
    pub elapsed: Duration,
}

/// What happened inside a single layer after its barrier resolved.
#[derive(Debug)]
pub(crate) struct LayerOutcome {
    pub succeeded: Vec<TaskName>,
    /// First failure in completion order, preferring a real failure over a
    /// cancellation it caused.
    pub failure: Option<ProvisionError>,
}
