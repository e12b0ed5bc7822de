use ampguard_config::load_toml;
use rstest::rstest;

const PHASES: &str = r#"
[phases]
l1 = { pin = 34, rated_amps = 20 }
l2 = { pin = 35, rated_amps = 20 }
l3 = { pin = 32, rated_amps = 20 }
"#;

fn with_section(extra: &str) -> String {
    format!("{PHASES}\n{extra}\n")
}

#[test]
fn accepts_full_advanced_config() {
    let toml = with_section(
        r#"
[system]
variant = "advanced"

[adc]
vref = 3.3
resolution = 4096

[relay]
pin = 26
active_low = true

[calibration]
presence_samples = 20
presence_interval_ms = 10
warmup_discard = 100
coarse_samples = 500
coarse_delay_ms = 5
fine_samples = 2000
fine_delay_ms = 20

[noise]
advanced_samples = 100
margin_factor = 1.5

[protection]
overcurrent_trip_a = 7.0
imbalance_limit_a = 1.0
min_current_for_imbalance_a = 0.5
restart_threshold_a = 2.0
lockout_ms = 5000
max_trip_count = 3
trip_reset_ms = 60000

[control]
cycle_ms = 200

[drift]
interval_ms = 1000

[logging]
level = "debug"
rotation = "daily"
"#,
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert!(cfg.relay.active_low);
    assert!(cfg.drift_enabled());
}

#[rstest]
#[case("[control]\ncycle_ms = 0", "control.cycle_ms must be >= 1")]
#[case("[adc]\nvref = 0.0", "adc.vref must be > 0")]
#[case("[adc]\nresolution = 16", "adc.resolution")]
#[case("[protection]\nmax_trip_count = 0", "max_trip_count must be >= 1")]
#[case(
    "[protection]\nlockout_ms = 60000\ntrip_reset_ms = 5000",
    "trip_reset_ms must exceed"
)]
#[case("[protection]\nrestart_threshold_a = 9.0", "restart_threshold_a")]
#[case("[noise]\nmargin_factor = 0.5", "margin_factor must be >= 1.0")]
#[case("[noise]\nceiling_a = 0.0", "ceiling_a must be > 0")]
#[case("[calibration]\npresence_samples = 1", "presence_samples must be >= 2")]
#[case("[calibration]\nfine_samples = 0", "sample counts must be >= 1")]
#[case("[drift]\ninterval_ms = 0", "drift.interval_ms must be >= 1")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
fn rejects_invalid_sections(#[case] section: &str, #[case] needle: &str) {
    let cfg = load_toml(&with_section(section)).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error `{err}` should contain `{needle}`"
    );
}

#[test]
fn rejects_unsupported_sensor_range() {
    let toml = r#"
[phases]
l1 = { pin = 34, rated_amps = 5 }
l2 = { pin = 35, rated_amps = 20 }
l3 = { pin = 32, rated_amps = 20 }
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("5 A sensor is unsupported");
    assert!(format!("{err}").contains("rated_amps must be 20 or 30"));
}

#[test]
fn explicit_sensitivity_overrides_range_check() {
    let toml = r#"
[phases]
l1 = { pin = 34, rated_amps = 5, sensitivity_v_per_a = 0.185 }
l2 = { pin = 35, rated_amps = 20 }
l3 = { pin = 32, rated_amps = 20 }
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("explicit sensitivity is accepted");
    assert!((cfg.phases.l1.sensitivity() - 0.185).abs() < 1e-6);
}

#[test]
fn rejects_shared_pins() {
    let toml = r#"
[phases]
l1 = { pin = 34, rated_amps = 20 }
l2 = { pin = 34, rated_amps = 20 }
l3 = { pin = 32, rated_amps = 20 }
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("duplicate pins");
    assert!(format!("{err}").contains("distinct pins"));
}

#[test]
fn missing_phases_section_is_a_parse_error() {
    assert!(load_toml("[control]\ncycle_ms = 200\n").is_err());
}
