// src/dag/layers.rs

//! Readiness computation shared by the scheduler and the graph renderer.

use std::collections::HashSet;

use crate::dag::registry::TaskRegistry;
use crate::types::TaskName;

/// Tasks in `remaining` whose dependencies are all in `completed`, in
/// registration order.
pub fn ready_layer(
    registry: &TaskRegistry,
    remaining: &HashSet<TaskName>,
    completed: &HashSet<TaskName>,
) -> Vec<TaskName> {
    registry
        .tasks()
        .filter(|task| remaining.contains(task.name()))
        .filter(|task| task.dependencies().iter().all(|dep| completed.contains(dep)))
        .map(|task| task.name().to_string())
        .collect()
}

/// Layers a run would execute if every task succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerPlan {
    pub layers: Vec<Vec<TaskName>>,
    /// Tasks that never become ready (cycles or missing dependencies).
    pub unresolved: Vec<TaskName>,
}

/// Simulate a fully successful run without invoking any task body.
pub fn plan_layers(registry: &TaskRegistry) -> LayerPlan {
    let mut remaining: HashSet<TaskName> = registry.names().map(str::to_string).collect();
    let mut completed: HashSet<TaskName> = HashSet::new();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let ready = ready_layer(registry, &remaining, &completed);
        if ready.is_empty() {
            break;
        }
        for name in &ready {
            remaining.remove(name);
            completed.insert(name.clone());
        }
        layers.push(ready);
    }

    let unresolved = registry
        .names()
        .filter(|name| remaining.contains(*name))
        .map(str::to_string)
        .collect();

    LayerPlan { layers, unresolved }
}
