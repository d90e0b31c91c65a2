// src/dag/validate.rs

//! Eager graph validation.
//!
//! The scheduler on its own only notices an unsatisfiable graph when no
//! task is ready; this check names the exact problem up front.

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::errors::{ProvisionError, Result};
use crate::types::TaskName;

/// Check `(task, dependencies)` pairs for unknown names and cycles.
///
/// Unknown dependencies are reported first (in iteration order), then
/// cycles, naming every task that takes part in one.
pub fn check_dependencies<'a, I>(tasks: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a [TaskName])>,
{
    let tasks: Vec<(&str, &[TaskName])> = tasks.into_iter().collect();

    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for &(name, _) in &tasks {
        graph.add_node(name);
    }

    for &(name, deps) in &tasks {
        for dep in deps.iter() {
            if !graph.contains_node(dep.as_str()) {
                return Err(ProvisionError::UnknownDependency {
                    task: name.to_string(),
                    dependency: dep.clone(),
                });
            }
            graph.add_edge(dep.as_str(), name, ());
        }
    }

    if toposort(&graph, None).is_ok() {
        return Ok(());
    }

    let mut cyclic: Vec<String> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .flatten()
        .map(str::to_string)
        .collect();
    cyclic.sort();

    Err(ProvisionError::DependencyCycle { tasks: cyclic })
}
