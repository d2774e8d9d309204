use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::{CommandCargoExt, OutputAssertExt};
use predicates::prelude::predicate;

fn demo_file(name: &str) -> PathBuf {
    let mut file = project_root::get_project_root().unwrap();
    file.push(Path::new("demos"));
    file.push(name);
    let file = file.canonicalize().unwrap();
    assert!(file.exists());
    file
}

#[test]
fn test_that_cli_app_produces_result() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("envelope-sim-cli")?;
    cmd.args([
        "--scenario-file",
        demo_file("flat_mareco.yaml").to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("flat_mareco: distance 10000 m"))
        .stdout(predicate::str::contains("target time"));

    Ok(())
}

#[test]
fn test_batch_as_csv() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("envelope-sim-cli")?;
    cmd.args([
        "--scenario-file",
        demo_file("flat_mareco.yaml").to_str().unwrap(),
        "--scenario-file",
        demo_file("max_effort_only.yaml").to_str().unwrap(),
        "--res-fmt",
        "csv",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(
            "name,distance,base_time,target_time,total_time,max_speed",
        ))
        .stdout(predicate::str::contains("flat_mareco,10000"))
        .stdout(predicate::str::contains("max_effort_only,20000"));

    Ok(())
}

#[test]
fn test_points_export() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let points_file = dir.path().join("points.csv");
    let envelope_file = dir.path().join("envelopes.json");
    let mut cmd = Command::cargo_bin("envelope-sim-cli")?;
    cmd.args([
        "--scenario-file",
        demo_file("max_effort_only.yaml").to_str().unwrap(),
        "--res-fmt",
        "json",
        "--points-file",
        points_file.to_str().unwrap(),
        "--envelope-file",
        envelope_file.to_str().unwrap(),
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"name\":\"max_effort_only\""));

    let points = std::fs::read_to_string(&points_file)?;
    assert!(points.starts_with("time,position,speed"));
    assert!(points.lines().count() > 2);
    assert!(std::fs::read_to_string(&envelope_file)?.contains("max_effort"));

    Ok(())
}

#[test]
fn test_export_needs_single_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("envelope-sim-cli")?;
    cmd.args([
        "--scenario-file",
        demo_file("flat_mareco.yaml").to_str().unwrap(),
        "--scenario-file",
        demo_file("max_effort_only.yaml").to_str().unwrap(),
        "--points-file",
        "points.csv",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("need a single `--scenario-file`"));

    Ok(())
}

#[test]
fn test_missing_scenario_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("envelope-sim-cli")?;
    cmd.args(["--scenario-file", "does-not-exist.yaml"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Could not load scenario file"));

    Ok(())
}
