// src/config/tasks.rs

//! Shell-command tasks declared in a plan file.

use tracing::debug;

use crate::config::model::PlanFile;
use crate::dag::TaskRegistry;
use crate::errors::{ProvisionError, Result};
use crate::exec::ExecutionContext;

/// Register one task per `[task.<name>]`, each running its `cmd` through
/// the execution context it is handed.
pub fn build_registry(plan: &PlanFile) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();
    let default_timeout = plan.run.default_timeout();

    for (name, task) in plan.task.iter() {
        let label = name.clone();
        let cmd = task.cmd.clone();
        let timeout = task.effective_timeout(default_timeout);
        let check = task.check;
        let deps: Vec<&str> = task.after.iter().map(String::as_str).collect();

        registry.register(
            name.clone(),
            &deps,
            move |ctx: ExecutionContext| {
                let label = label.clone();
                let cmd = cmd.clone();
                async move {
                    if check {
                        ctx.run(&label, &cmd, timeout).await?;
                    } else {
                        let result = ctx.run_unchecked(&label, &cmd, timeout).await?;
                        if !result.success() {
                            ctx.console().info(format!(
                                "[{label}] exit code {} ignored (check = false)",
                                result.exit_code
                            ));
                        }
                    }
                    Ok::<(), ProvisionError>(())
                }
            },
            task.description.clone().unwrap_or_default(),
        )?;
    }

    debug!(tasks = registry.len(), "built task registry from plan");
    Ok(registry)
}
