// src/dag/task_info.rs

//! Per-run task state.

/// Lifecycle of a task within one scheduling run.
///
/// `Pending -> Ready -> Running -> {Succeeded, Failed}`. `Cancelled` is only
/// reached when the scheduler is configured to cancel siblings of a failed
/// task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunState {
    /// Waiting on dependencies.
    Pending,
    /// Dependencies satisfied; selected for the current layer.
    Ready,
    /// Body is executing.
    Running,
    Succeeded,
    Failed,
    /// Stopped at a suspension point after a sibling failed.
    Cancelled,
}

impl TaskRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskRunState::Succeeded | TaskRunState::Failed | TaskRunState::Cancelled
        )
    }
}
