// src/config/validate.rs

use crate::config::model::{LauncherSpec, PlanFile, RawPlanFile};
use crate::dag::validate::check_dependencies;
use crate::errors::{ProvisionError, Result};
use crate::exec::context::is_valid_env_name;

/// One day; longer readiness waits are almost certainly a typo.
const MAX_READY_TIMEOUT_SECS: u64 = 24 * 60 * 60;

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::ProvisionError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_sections(plan)?;
    validate_tasks(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(ProvisionError::ConfigError(
            "plan must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_sections(plan: &RawPlanFile) -> Result<()> {
    if plan.retry.max_attempts == 0 {
        return Err(ProvisionError::ConfigError(
            "[retry].max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    if let LauncherSpec::Custom(argv) = &plan.target.launcher {
        if argv.is_empty() {
            return Err(ProvisionError::ConfigError(
                "[target].launcher must not be an empty list".to_string(),
            ));
        }
    }

    if plan.run.default_timeout_secs == 0 {
        return Err(ProvisionError::ConfigError(
            "[run].default_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    if plan.target.ready_timeout_secs > MAX_READY_TIMEOUT_SECS {
        return Err(ProvisionError::ConfigError(format!(
            "[target].ready_timeout_secs must be <= {MAX_READY_TIMEOUT_SECS} (got {})",
            plan.target.ready_timeout_secs
        )));
    }

    for key in plan.env.keys() {
        if !is_valid_env_name(key) {
            return Err(ProvisionError::ConfigError(format!(
                "[env] has invalid variable name '{key}'"
            )));
        }
    }

    Ok(())
}

fn validate_tasks(plan: &RawPlanFile) -> Result<()> {
    for (name, task) in plan.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(ProvisionError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
        if task.timeout_secs == Some(0) {
            return Err(ProvisionError::ConfigError(format!(
                "task '{name}' has `timeout_secs = 0`"
            )));
        }
        if task.after.iter().any(|dep| dep == name) {
            return Err(ProvisionError::ConfigError(format!(
                "task '{name}' cannot depend on itself in `after`"
            )));
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    check_dependencies(
        plan.task
            .iter()
            .map(|(name, task)| (name.as_str(), task.after.as_slice())),
    )
}
