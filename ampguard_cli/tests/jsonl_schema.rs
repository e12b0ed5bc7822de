use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_fast_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[phases]
l1 = { pin = 0, rated_amps = 20 }
l2 = { pin = 1, rated_amps = 20 }
l3 = { pin = 2, rated_amps = 30 }

[calibration]
presence_interval_ms = 0
single_samples = 50
single_delay_ms = 0

[noise]
basic_samples = 50
sample_delay_ms = 0

[control]
cycle_ms = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect()
}

/// Every stdout line of a --json run is one event object.
#[rstest]
fn jsonl_run_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--max-cycles", "3"]);

    let out = cmd.assert().success().get_output().stdout.clone();
    let events = json_lines(&out);
    let kinds: Vec<&str> = events
        .iter()
        .map(|v| v["event"].as_str().expect("event name"))
        .collect();

    assert_eq!(kinds.iter().filter(|k| **k == "sensor_presence").count(), 3);
    assert!(kinds.contains(&"zero_point"));
    assert!(kinds.contains(&"noise_profile"));
    assert!(kinds.contains(&"ready"));
    assert_eq!(kinds.iter().filter(|k| **k == "readings").count(), 3);
    assert_eq!(kinds.last(), Some(&"summary"));

    let readings = events.iter().find(|v| v["event"] == "readings").unwrap();
    assert_eq!(readings["currents_a"].as_array().map(Vec::len), Some(3));
    assert!(readings["average_a"].as_f64().is_some());

    let noise = events.iter().find(|v| v["event"] == "noise_profile").unwrap();
    assert_eq!(noise["policy"], "basic");
    assert!(noise["noise_a"].as_f64().is_some());

    let summary = events.last().unwrap();
    assert_eq!(summary["cycles"], 3);
    assert_eq!(summary["final_load"], "ON");
}

/// Errors in --json mode are a single object with a stable reason.
#[rstest]
fn jsonl_error_schema() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir);

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("--config")
        .arg(&cfg)
        .args(["self-check", "--sim-missing", "L3"]);

    let out = cmd.assert().code(3).get_output().stdout.clone();
    let events = json_lines(&out);
    let err = events.last().unwrap();
    assert_eq!(err["reason"], "SensorMissing");
    assert_eq!(err["details"]["phases"], serde_json::json!(["L3"]));
    assert!(err["message"].as_str().unwrap().starts_with("What happened"));
}
