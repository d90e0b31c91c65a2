// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Built-in ways of reaching a provisioning target.
///
/// - `Local`: run scripts with `sh -c` on this machine (the target id is
///   ignored). Useful for dry runs against a scratch directory.
/// - `Pct`: `pct exec <target> -- bash -c <script>` into a Proxmox LXC
///   container.
/// - `Ssh`: `ssh <target> bash -s`, with the script on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LauncherPreset {
    Local,
    Pct,
    Ssh,
}

impl Default for LauncherPreset {
    fn default() -> Self {
        LauncherPreset::Local
    }
}

impl FromStr for LauncherPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(LauncherPreset::Local),
            "pct" => Ok(LauncherPreset::Pct),
            "ssh" => Ok(LauncherPreset::Ssh),
            other => Err(format!(
                "invalid launcher: {other} (expected \"local\", \"pct\" or \"ssh\")"
            )),
        }
    }
}
