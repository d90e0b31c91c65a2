// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `provdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "provdag",
    version,
    about = "Provision a remote target by running a dependency graph of setup tasks.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the provisioning plan (TOML).
    #[arg(long, value_name = "PATH", default_value = "Provision.toml")]
    pub plan: String,

    /// Target identifier; overrides `[target].id` from the plan.
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,

    /// Configuration selector passed to tasks; overrides `[options]`.
    ///
    /// May be given multiple times.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    /// Print per-command progress and captured output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROVDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the layered dependency graph and exit without running anything.
    #[arg(long)]
    pub print_graph: bool,

    /// Do not poll the target with `echo ready` before running tasks.
    #[arg(long)]
    pub skip_ready_check: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
