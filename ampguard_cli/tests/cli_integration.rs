use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Simulator-friendly config: no sleeps during calibration, 1 ms control cycles
fn write_fast_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[phases]
l1 = {{ pin = 0, rated_amps = 20 }}
l2 = {{ pin = 1, rated_amps = 20 }}
l3 = {{ pin = 2, rated_amps = 20 }}

[calibration]
presence_interval_ms = 0
single_samples = 50
single_delay_ms = 0
warmup_discard = 5
coarse_samples = 20
coarse_delay_ms = 0
fine_samples = 20
fine_delay_ms = 0

[noise]
basic_samples = 50
advanced_samples = 20
sample_delay_ms = 0

[control]
cycle_ms = 1
{extra}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "Self-check OK", "stdout")]
#[case(&["self-check", "--sim-missing", "L2"], 3, "not detected on L2", "stderr")]
#[case(&["calibrate"], 0, "Calibration OK", "stdout")]
#[case(&["run", "--max-cycles", "5"], 0, "Stopped after 5 cycles", "stdout")]
#[case(&["run", "--max-cycles", "3", "--sim-jitter", "70"], 4, "exceeds ceiling", "stderr")]
#[case(&["run", "--max-cycles", "3", "--sim-missing", "L1"], 3, "What happened", "stderr")]
#[case(&["run", "--fault-amps", "3"], 2, "inject-fault", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir, "");

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn injected_fault_trips_and_opens_relay() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir, "");

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("error")
        .args(["run", "--max-cycles", "30", "--sim-load", "2.0"])
        .args(["--inject-fault", "L2", "--fault-amps", "8", "--fault-after", "3"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("TRIP:"))
        .stdout(predicate::str::contains("trips 1"))
        .stdout(predicate::str::contains("load OFF"));
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        r#"
[phases]
l1 = { pin = 0, rated_amps = 20 }
l2 = { pin = 1, rated_amps = 20 }
l3 = { pin = 2, rated_amps = 20 }

[control]
cycle_ms = 0
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("cycle_ms"));
}

#[rstest]
fn replay_trace_drives_the_loop() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir, "");

    let trace = dir.path().join("trace.csv");
    let mut f = fs::File::create(&trace).unwrap();
    writeln!(f, "l1,l2,l3").unwrap();
    for i in 0..40 {
        let code = if i % 2 == 0 { 3100 } else { 3106 };
        writeln!(f, "{code},{code},{code}").unwrap();
    }

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--log-level")
        .arg("error")
        .args(["run", "--max-cycles", "3", "--replay"])
        .arg(&trace);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Stopped after 3 cycles"));
}

#[rstest]
fn cli_reports_bad_replay_header() {
    let dir = tempdir().unwrap();
    let cfg = write_fast_config(&dir, "");

    let bad_csv = dir.path().join("trace.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "a,b,c").unwrap();
    writeln!(f, "3103,3103,3103").unwrap();

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["self-check", "--replay"])
        .arg(&bad_csv);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid replay trace"));
}

#[rstest]
fn log_file_is_written_when_configured() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("logs").join("ampguard.log");
    let extra = format!(
        "\n[logging]\nfile = {:?}\nlevel = \"info\"\n",
        log.display().to_string()
    );
    let cfg = write_fast_config(&dir, &extra);

    let mut cmd = Command::cargo_bin("ampguard").unwrap();
    cmd.arg("--config").arg(&cfg).arg("self-check");
    cmd.assert().success();

    let text = fs::read_to_string(&log).unwrap();
    assert!(text.contains("sensor_presence"), "{text}");
}
