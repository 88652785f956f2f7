//! Integration tests: argument parsing → rank-gated output → algorithm run.

use std::fs;
use std::path::Path;

use nbkit_cli::{dispatch, DispatchError, Outcome};
use nbkit_core::{ConfigError, Console, GroupTopology, Registry, RegistryError};

// ─────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────

struct Captured {
    outcome: Result<Outcome, DispatchError>,
    stdout: String,
    stderr: String,
}

fn topology(rank: usize) -> GroupTopology {
    GroupTopology {
        rank,
        size: 4,
        processor_name: "nid00001".into(),
    }
}

fn run_as(rank: usize, args: &[&str]) -> Captured {
    let topology = topology(rank);
    let mut registry = Registry::with_builtins();
    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = {
        let mut console = Console::new(topology.role(), Box::new(&mut out), Box::new(&mut err));
        let argv = std::iter::once("nbkit").chain(args.iter().copied());
        dispatch(argv, &mut registry, &topology, &mut console)
    };
    Captured {
        outcome,
        stdout: String::from_utf8(out).unwrap(),
        stderr: String::from_utf8(err).unwrap(),
    }
}

fn run(args: &[&str]) -> Captured {
    run_as(0, args)
}

fn exit_code(c: &Captured) -> i32 {
    match &c.outcome {
        Ok(Outcome::Exit(code)) => *code,
        other => panic!("expected an exit, got {other:?}"),
    }
}

fn write_catalog(dir: &Path) -> String {
    let path = dir.join("catalog.txt");
    fs::write(&path, "# value\n1.0\n2.0\n3.0\n4.0\n").unwrap();
    path.display().to_string()
}

// ─────────────────────────────────────────────────────────────
// Help, listing and version
// ─────────────────────────────────────────────────────────────

#[test]
fn generic_help_on_primary_only() {
    let primary = run(&["-h"]);
    assert_eq!(exit_code(&primary), 0);
    assert!(primary.stdout.contains("Usage:"));
    assert!(primary.stdout.contains("--list-algorithms"));

    let other = run_as(2, &["--help"]);
    assert_eq!(exit_code(&other), 0);
    assert!(other.stdout.is_empty() && other.stderr.is_empty());
}

#[test]
fn plugin_help() {
    let c = run(&["Histogram", "-h"]);
    assert_eq!(exit_code(&c), 0);
    assert!(c.stdout.starts_with("Histogram (Algorithm): "));
    assert!(c.stdout.contains("  bins : integer (default: 10)"));
}

#[test]
fn listing_names_and_full_help() {
    let c = run(&["--list-algorithms"]);
    assert_eq!(exit_code(&c), 0);
    assert!(c.stdout.starts_with("Algorithms:\n"));
    assert!(c.stdout.contains("Describe") && c.stdout.contains("Histogram"));

    let c = run(&["--list-algorithms", "Describe"]);
    assert_eq!(exit_code(&c), 0);
    assert!(c.stdout.contains("Parameters\n----------"));

    let c = run(&["--list-painters"]);
    assert_eq!(c.stdout, "Painters:\n  (none)\n");
}

#[test]
fn version_exits_zero_everywhere() {
    let primary = run(&["--version"]);
    assert_eq!(exit_code(&primary), 0);
    assert!(primary.stdout.starts_with("nbkit "));
    let other = run_as(1, &["--version"]);
    assert_eq!(exit_code(&other), 0);
    assert!(other.stdout.is_empty());
}

// ─────────────────────────────────────────────────────────────
// Usage errors
// ─────────────────────────────────────────────────────────────

#[test]
fn unknown_algorithm_is_a_usage_error_on_every_rank() {
    let primary = run(&["-c", "path: x", "NoSuchThing"]);
    assert_eq!(exit_code(&primary), 2);
    assert!(primary.stderr.contains("invalid choice: 'NoSuchThing'"));
    assert!(primary.stderr.contains("'Describe', 'Histogram'"));

    let other = run_as(3, &["-c", "path: x", "NoSuchThing"]);
    assert_eq!(exit_code(&other), 2);
    assert!(other.stderr.is_empty());
}

#[test]
fn missing_name_or_config() {
    let c = run(&["-c", "path: x"]);
    assert_eq!(exit_code(&c), 2);
    assert!(c.stderr.contains("ALGORITHM_NAME"));

    let c = run(&["Describe"]);
    assert_eq!(exit_code(&c), 2);
    assert!(c.stderr.contains("--config"));

    let c = run(&["--bogus"]);
    assert_eq!(exit_code(&c), 2);
}

// ─────────────────────────────────────────────────────────────
// Running algorithms
// ─────────────────────────────────────────────────────────────

#[test]
fn config_file_and_output_flag() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let config = dir.path().join("describe.yaml");
    fs::write(&config, format!("path: {catalog}\n")).unwrap();
    let output = dir.path().join("stats.json").display().to_string();

    let c = run(&["-c", config.to_str().unwrap(), "-o", &output, "Describe"]);
    assert_eq!(c.outcome.unwrap(), Outcome::Completed { output: output.clone() });

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(saved["count"], 4);
    assert_eq!(saved["mean"], 2.5);
}

#[test]
fn output_flag_overrides_config_output() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let from_config = dir.path().join("from-config.json");
    let from_flag = dir.path().join("from-flag.json");
    let text = format!("path: {catalog}\noutput: {}\n", from_config.display());

    run(&["-c", &text, "-o", from_flag.to_str().unwrap(), "Describe"]).outcome.unwrap();
    assert!(from_flag.exists());
    assert!(!from_config.exists());

    run(&["-c", &text, "Describe"]).outcome.unwrap();
    assert!(from_config.exists());
}

#[test]
fn missing_output_fails_before_running() {
    let c = run(&["-c", "path: /nonexistent/catalog.txt", "Describe"]);
    assert!(matches!(c.outcome, Err(DispatchError::MissingOutput)));
}

#[test]
fn wrong_type_names_the_field() {
    let c = run(&["-c", "path: x\nbins: many\noutput: h.csv", "Histogram"]);
    match c.outcome {
        Err(DispatchError::Registry(RegistryError::Config(ConfigError::TypeMismatch { field, .. }))) => {
            assert_eq!(field, "bins");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn non_primary_runs_but_does_not_save() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let output = dir.path().join("hist.csv");
    let text = format!("path: {catalog}\nbins: 2\n");

    let c = run_as(1, &["-c", &text, "-o", output.to_str().unwrap(), "Histogram"]);
    assert!(matches!(c.outcome, Ok(Outcome::Completed { .. })));
    assert!(!output.exists());

    run(&["-c", &text, "-o", output.to_str().unwrap(), "Histogram"]).outcome.unwrap();
    assert!(fs::read_to_string(&output).unwrap().contains("bin_low,bin_high,count"));
}

// ─────────────────────────────────────────────────────────────
// Plugin manifests
// ─────────────────────────────────────────────────────────────

const MANIFEST: &str = r#"
[[plugin]]
name = "Echo"
category = "algorithm"
summary = "returns its parameters"
command = ["cat"]

[[plugin.param]]
name = "Nmesh"
kind = "integer"
required = true

[[plugin]]
name = "TopHat"
category = "transfer"
summary = "top-hat window"
"#;

#[test]
fn manifests_extend_listings_and_choices() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("plugins.toml");
    fs::write(&manifest, MANIFEST).unwrap();
    let x = manifest.to_str().unwrap();

    let c = run(&["-X", x, "--list-transfers"]);
    assert!(c.stdout.contains("TopHat"));

    let c = run(&["-X", x, "Echo", "-h"]);
    assert_eq!(exit_code(&c), 0);
    assert!(c.stdout.contains("Nmesh : integer (required)"));
}

#[cfg(unix)]
#[test]
fn external_algorithm_runs_through_dispatch() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("plugins.toml");
    fs::write(&manifest, MANIFEST).unwrap();
    let output = dir.path().join("echo.json");

    let c = run(&[
        "-X",
        manifest.to_str().unwrap(),
        "-c",
        "Nmesh: 64",
        "-o",
        output.to_str().unwrap(),
        "Echo",
    ]);
    c.outcome.unwrap();
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(saved["Nmesh"], 64);
}
