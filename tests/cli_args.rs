// tests/cli_args.rs

mod common;
use crate::common::{init_tracing, TestResult};

use std::fs;

use clap::Parser;
use provdag::cli::{CliArgs, LogLevel};
use provdag::logging::build_filter;
use tempfile::tempdir;

#[test]
fn defaults_point_at_provision_toml() -> TestResult {
    let args = CliArgs::try_parse_from(["provdag"])?;

    assert_eq!(args.plan, "Provision.toml");
    assert_eq!(args.target, None);
    assert!(args.options.is_empty());
    assert!(!args.verbose);
    assert!(!args.print_graph);
    assert!(!args.skip_ready_check);
    assert!(args.log_level.is_none());
    Ok(())
}

#[test]
fn options_and_flags_are_parsed() -> TestResult {
    let args = CliArgs::try_parse_from([
        "provdag",
        "--plan",
        "dev.toml",
        "--target",
        "205",
        "--option",
        "ide=openvscode",
        "--option",
        "extra=a=b",
        "-v",
        "--log-level",
        "debug",
        "--skip-ready-check",
    ])?;

    assert_eq!(args.plan, "dev.toml");
    assert_eq!(args.target.as_deref(), Some("205"));
    assert_eq!(
        args.options,
        vec![
            ("ide".to_string(), "openvscode".to_string()),
            ("extra".to_string(), "a=b".to_string()),
        ]
    );
    assert!(args.verbose);
    assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    assert!(args.skip_ready_check);
    Ok(())
}

#[test]
fn malformed_option_is_rejected() {
    assert!(CliArgs::try_parse_from(["provdag", "--option", "no-equals"]).is_err());
    assert!(CliArgs::try_parse_from(["provdag", "--option", "=value"]).is_err());
}

#[test]
fn log_filter_prefers_cli_level_over_environment() {
    let from_cli = build_filter(Some(LogLevel::Debug), Some("provdag=bogus"));
    assert!(from_cli.is_ok());

    assert!(build_filter(None, Some("provdag::exec=debug,warn")).is_ok());
    assert!(build_filter(None, Some("   ")).is_ok());
    assert!(build_filter(None, None).is_ok());

    let err = build_filter(None, Some("provdag=bogus")).unwrap_err();
    assert!(err.to_string().contains("PROVDAG_LOG"));
}

#[tokio::test]
async fn print_graph_does_not_need_a_target() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let marker = dir.path().join("ran");
    let plan = dir.path().join("Provision.toml");
    fs::write(
        &plan,
        format!(
            "[task.touch]\ncmd = \"touch {}\"\n",
            marker.display()
        ),
    )?;

    let args = CliArgs::try_parse_from([
        "provdag",
        "--plan",
        plan.to_str().unwrap_or_default(),
        "--print-graph",
    ])?;
    provdag::run(args).await?;

    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn missing_target_is_reported() -> TestResult {
    let dir = tempdir()?;
    let plan = dir.path().join("Provision.toml");
    fs::write(&plan, "[task.a]\ncmd = \"true\"\n")?;

    let args = CliArgs::try_parse_from(["provdag", "--plan", plan.to_str().unwrap_or_default()])?;
    let err = provdag::run(args).await.unwrap_err();
    assert!(err.to_string().contains("no target"));
    Ok(())
}

#[tokio::test]
async fn local_plan_runs_end_to_end() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    let out = dir.path().join("out.txt");
    let plan = dir.path().join("Provision.toml");
    fs::write(
        &plan,
        format!(
            r#"
[target]
id = "localhost"
launcher = "local"

[env]
OUT = "{out}"

[task.first]
cmd = "echo first >> \"$OUT\""

[task.second]
cmd = "echo second-$IDE >> \"$OUT\""
after = ["first"]
"#,
            out = out.display()
        ),
    )?;

    let args = CliArgs::try_parse_from([
        "provdag",
        "--plan",
        plan.to_str().unwrap_or_default(),
        "--option",
        "ide=unused",
    ])?;
    provdag::run(args).await?;

    assert_eq!(fs::read_to_string(&out)?, "first\nsecond-\n");
    Ok(())
}

#[tokio::test]
async fn failing_local_plan_returns_an_error() -> TestResult {
    let dir = tempdir()?;
    let plan = dir.path().join("Provision.toml");
    fs::write(
        &plan,
        "[target]\nid = \"localhost\"\n\n[task.broken]\ncmd = \"exit 9\"\n",
    )?;

    let args = CliArgs::try_parse_from([
        "provdag",
        "--plan",
        plan.to_str().unwrap_or_default(),
        "--skip-ready-check",
    ])?;
    let err = provdag::run(args).await.unwrap_err();

    let root = err
        .downcast_ref::<provdag::ProvisionError>()
        .map(|e| e.kind());
    assert_eq!(root, Some(provdag::ErrorKind::TaskExecution));
    Ok(())
}
