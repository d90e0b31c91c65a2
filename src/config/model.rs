// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::SchedulerOptions;
use crate::exec::{CommandBackend, RetryPolicy, ScriptDelivery};
use crate::types::LauncherPreset;

/// Top-level provisioning plan as read from a TOML file.
///
/// ```toml
/// [target]
/// id = "101"
/// launcher = "pct"
///
/// [env]
/// CARGO_HOME = "/usr/local/cargo"
///
/// [task.setup]
/// cmd = "apt-get update"
///
/// [task.build]
/// cmd = "make"
/// after = ["setup"]
/// ```
///
/// All sections except `[task.<name>]` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub target: TargetSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub run: RunSection,

    /// Variables exported in front of every command.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Configuration selectors handed to task bodies through the context.
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A plan that passed validation. Construct it via `TryFrom<RawPlanFile>`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub target: TargetSection,
    pub retry: RetrySection,
    pub run: RunSection,
    pub env: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(raw: RawPlanFile) -> Self {
        Self {
            target: raw.target,
            retry: raw.retry,
            run: raw.run,
            env: raw.env,
            options: raw.options,
            task: raw.task,
        }
    }
}

/// Either a preset name or an explicit launcher argv.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LauncherSpec {
    Preset(LauncherPreset),
    Custom(Vec<String>),
}

impl Default for LauncherSpec {
    fn default() -> Self {
        LauncherSpec::Preset(LauncherPreset::default())
    }
}

/// `[target]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSection {
    /// Target identifier substituted for `{target}` in the launcher.
    /// May be supplied on the command line instead.
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub launcher: LauncherSpec,

    /// Send the script on stdin instead of as the last argument. Only
    /// consulted for custom launchers; presets know their own delivery.
    #[serde(default)]
    pub script_via_stdin: bool,

    /// Launcher exit codes that mean "could not reach the target".
    #[serde(default)]
    pub transport_exit_codes: Option<Vec<i32>>,

    /// How long to wait for the target to answer before running tasks.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

fn default_ready_timeout_secs() -> u64 {
    120
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            id: None,
            launcher: LauncherSpec::default(),
            script_via_stdin: false,
            transport_exit_codes: None,
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

impl TargetSection {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Build the process backend described by this section.
    pub fn backend(&self) -> CommandBackend {
        let backend = match &self.launcher {
            LauncherSpec::Preset(LauncherPreset::Local) => CommandBackend::local(),
            LauncherSpec::Preset(LauncherPreset::Pct) => CommandBackend::pct(),
            LauncherSpec::Preset(LauncherPreset::Ssh) => CommandBackend::ssh(),
            LauncherSpec::Custom(argv) => {
                let delivery = if self.script_via_stdin {
                    ScriptDelivery::Stdin
                } else {
                    ScriptDelivery::Argument
                };
                CommandBackend::new(argv.clone()).with_delivery(delivery)
            }
        };

        match &self.transport_exit_codes {
            Some(codes) => backend.with_transport_exit_codes(codes.clone()),
            None => backend,
        }
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Defaults to four times `base_delay_ms`.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

fn default_max_attempts() -> u32 {
    crate::exec::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    crate::exec::retry::DEFAULT_BASE_DELAY.as_millis() as u64
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: None,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms));
        match self.max_delay_ms {
            Some(ms) => policy.with_max_delay(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    #[serde(default)]
    pub cancel_siblings_on_failure: bool,
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            cancel_siblings_on_failure: false,
        }
    }
}

impl RunSection {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Plans are always validated eagerly by the loader, so the scheduler
    /// re-checks nothing but honours the cancellation switch.
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            cancel_siblings_on_failure: self.cancel_siblings_on_failure,
            validate_dependencies: false,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command run on the target.
    pub cmd: String,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Per-task timeout; falls back to `[run].default_timeout_secs`.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// If false, a non-zero exit code is logged but does not fail the task.
    #[serde(default = "default_check")]
    pub check: bool,
}

fn default_check() -> bool {
    true
}

impl TaskConfig {
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}
