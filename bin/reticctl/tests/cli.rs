//! ---
//! retic_section: "05-networking-external-interfaces"
//! retic_subsection: "binary"
//! retic_type: "source"
//! retic_scope: "code"
//! retic_description: "Command-line front end for radial network analysis."
//! retic_version: "v0.0.0-prealpha"
//! retic_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;

fn reticctl(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reticctl").unwrap();
    cmd.current_dir(workdir)
        .env_remove("RETIC_CONFIG")
        .env("RETIC_LOG", "warn");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let assert = cmd.assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

const FEEDER_JSON: &str = r#"{
  "name": "Farm feeder",
  "nodes": [
    {"id": "s", "name": "Grid", "voltage": 11, "type": "SOURCE", "faultLevel3Ph": 8},
    {"id": "l", "name": "Farm", "voltage": 11, "type": "LOAD", "rating": 200, "powerFactor": 0.9}
  ],
  "edges": [
    {"id": "e1", "from": "s", "to": "l", "length": 1500, "conductorType": "Mink"}
  ]
}"#;

#[test]
fn demo_summary_lists_overloads() {
    let dir = tempfile::tempdir().unwrap();
    let out = stdout_of(reticctl(dir.path()).args(["demo", "--format", "summary"]));
    assert!(out.starts_with("3 violation(s) found"), "{out}");
    assert!(out.contains("Hare @"));
}

#[test]
fn analyze_prints_result_contract_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("feeder.json");
    fs::write(&file, FEEDER_JSON).unwrap();

    let out = stdout_of(reticctl(dir.path()).arg("analyze").arg(&file));
    let result: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(result["edgeAnalysis"][0]["status"], "NORMAL");
    assert_eq!(result["voltageProfile"][1]["nodeName"], "Farm");
    assert!(result["summary"]
        .as_str()
        .unwrap()
        .starts_with("No violations found"));
}

#[test]
fn analyze_editor_file_exports_report() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("diagram.json");
    fs::write(
        &file,
        r#"{"nodes": [
            {"id": "n1", "type": "SOURCE", "x": 0, "y": 0, "data": {"name": "Grid", "voltage": 11}},
            {"id": "n2", "type": "LOAD", "x": 50, "y": 0, "data": {"name": "Shop", "voltage": 11, "rating": 50}}
        ],
        "edges": [{"id": "e1", "from": "n1", "to": "n2", "length": 100, "conductorType": "Dog"}]}"#,
    )
    .unwrap();
    let reports = dir.path().join("reports");

    reticctl(dir.path())
        .arg("analyze")
        .arg(&file)
        .arg("--editor")
        .args(["--format", "yaml", "--output"])
        .arg(&reports)
        .assert()
        .success();

    let envelope: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(reports.join("analysis.json")).unwrap()).unwrap();
    assert_eq!(envelope["networkName"], "network");
    assert!(envelope["data"]["nodeResults"]["Shop"].is_object());
}

#[test]
fn libraries_command_prints_sans_tables() {
    let dir = tempfile::tempdir().unwrap();
    let out = stdout_of(reticctl(dir.path()).arg("libraries"));
    let libraries: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(libraries["conductors"]["Hare"]["ampacity_a"], 130.0);
    assert_eq!(libraries["transformers"].as_array().unwrap().len(), 18);
}

#[test]
fn config_file_changes_voltage_band() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("retic.toml"),
        "[analysis]\nvoltage_min_pu = 0.99\n",
    )
    .unwrap();
    let out = stdout_of(reticctl(dir.path()).args(["demo", "--format", "summary"]));
    assert!(out.contains("under 0.99 p.u. limit"), "{out}");
}

#[test]
fn missing_network_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    reticctl(dir.path())
        .args(["analyze", "does-not-exist.json"])
        .assert()
        .failure();
}
