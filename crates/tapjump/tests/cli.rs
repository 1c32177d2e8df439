#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;

fn tapjump() -> Command {
    Command::cargo_bin("tapjump").expect("binary built")
}

#[test]
fn help_lists_subcommands() {
    tapjump()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("fit"));
}

#[test]
fn run_requires_a_readable_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.json");
    tapjump()
        .args(["run", "--config"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn run_rejects_missing_templates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("tapjump.json");
    std::fs::write(
        &config,
        r#"{ "assets": { "piece": "piece.png", "marker_dark": "d.png", "marker_light": "l.png" } }"#,
    )
    .expect("write config");
    tapjump()
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load template"));
}

#[test]
fn start_and_restart_conflict() {
    tapjump()
        .args(["run", "--config", "x.json", "--start", "--restart"])
        .assert()
        .failure();
}

#[test]
fn fit_prints_polynomial_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = dir.path().join("samples.jsonl");
    let lines: Vec<String> = [(100.0, 210), (200.0, 410), (300.0, 610), (400.0, 810)]
        .iter()
        .map(|&(distance, ms)| {
            format!(
                r#"{{"actual_distance":{distance},"duration_ms":{ms},"landed_on_center":true,"outcome":"short","miss":3.0}}"#
            )
        })
        .collect();
    std::fs::write(&samples, lines.join("\n")).expect("write samples");

    tapjump()
        .args(["fit", "--degree", "1", "--samples"])
        .arg(&samples)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""kind":"polynomial""#))
        .stdout(predicate::str::contains(r#""scale":400.0"#));
}

#[test]
fn fit_reports_bad_sample_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let samples = dir.path().join("samples.jsonl");
    std::fs::write(
        &samples,
        "{\"actual_distance\":1.0,\"duration_ms\":2,\"landed_on_center\":false,\"outcome\":\"long\",\"miss\":0.5}\nnot json\n",
    )
    .expect("write samples");

    tapjump()
        .args(["fit", "--samples"])
        .arg(&samples)
        .assert()
        .failure()
        .stderr(predicate::str::contains(":2:"));
}
