#![allow(dead_code)]

use std::collections::BTreeMap;

use provdag::config::{PlanFile, RawPlanFile, RetrySection, RunSection, TargetSection, TaskConfig};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                target: TargetSection::default(),
                retry: RetrySection::default(),
                run: RunSection::default(),
                env: BTreeMap::new(),
                options: BTreeMap::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.plan.task.insert(name.to_string(), task);
        self
    }

    pub fn with_target_id(mut self, id: &str) -> Self {
        self.plan.target.id = Some(id.to_string());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.plan.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.plan.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.plan.retry.max_attempts = attempts;
        self
    }

    pub fn with_cancel_siblings_on_failure(mut self, val: bool) -> Self {
        self.plan.run.cancel_siblings_on_failure = val;
        self
    }

    /// The unvalidated plan, for tests that exercise validation itself.
    pub fn build_raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
                description: None,
                timeout_secs: None,
                check: true,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.task.timeout_secs = Some(secs);
        self
    }

    pub fn check(mut self, val: bool) -> Self {
        self.task.check = val;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
