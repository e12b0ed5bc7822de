//! Human-readable error descriptions and structured JSON error formatting.

use ampguard_core::error::{BuildError, CalibrationFailure, MonitorError};

fn calibration_failure(err: &eyre::Report) -> Option<&CalibrationFailure> {
    err.chain().find_map(|e| e.downcast_ref::<CalibrationFailure>())
}

fn monitor_error(err: &eyre::Report) -> Option<&MonitorError> {
    err.chain().find_map(|e| e.downcast_ref::<MonitorError>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingAdc => {
                "What happened: No analog input was provided to the controller.\nLikely causes: The ADC backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the converter is created successfully and passed via with_adc(...).".to_string()
            }
            BuildError::MissingRelay => {
                "What happened: No relay output was provided to the controller.\nLikely causes: The relay GPIO failed to initialize or was not wired into the builder.\nHow to fix: Ensure the relay is created successfully and passed via with_relay(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/ampguard.toml for a sample."
            ),
        };
    }

    if let Some(cf) = calibration_failure(err) {
        return match cf {
            CalibrationFailure::SensorMissing(_) => format!(
                "What happened: {cf}.\nLikely causes: Sensor unplugged, no 5V supply, or the wrong pin in [phases].\nHow to fix: Check sensor wiring and power, run `ampguard self-check`, then restart. The load stays disconnected until a clean boot."
            ),
            CalibrationFailure::NoiseTooHigh { .. } => format!(
                "What happened: {cf}.\nLikely causes: Load current flowing during calibration, a noisy supply, or long unshielded sensor leads.\nHow to fix: Make sure no current flows at boot, improve grounding, then restart."
            ),
        };
    }

    if let Some(me) = monitor_error(err) {
        return match me {
            MonitorError::Hardware(_) | MonitorError::HardwareFault(_) => format!(
                "What happened: {me}.\nLikely causes: ADC bus wiring, SPI disabled, or the relay GPIO in use by another process.\nHow to fix: Verify wiring and permissions; the relay was opened before exit."
            ),
            _ => format!(
                "What happened: {me}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.chain().find_map(|e| e.downcast_ref::<toml::de::Error>()) {
        return format!(
            "What happened: The config file is not valid TOML for this program.\nLikely causes: A typo, a missing [phases] table, or an unknown value.\nHow to fix: Compare with etc/ampguard.toml. Parser said: {te}"
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        let cause = err.source().map(|s| s.to_string()).unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass an existing file with --config. Original: {msg}"
        );
    }

    if lower.contains("raw trace csv") || lower.contains("invalid csv row") {
        return "Invalid replay trace. Expected a CSV with headers 'l1,l2,l3' and raw ADC codes.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: sensor missing 3, noise too high 4, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match calibration_failure(err) {
        Some(CalibrationFailure::SensorMissing(_)) => 3,
        Some(CalibrationFailure::NoiseTooHigh { .. }) => 4,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(cf) = calibration_failure(err) {
        return match cf {
            CalibrationFailure::SensorMissing(_) => "SensorMissing",
            CalibrationFailure::NoiseTooHigh { .. } => "NoiseTooHigh",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidSetup";
    }
    match monitor_error(err) {
        Some(MonitorError::Hardware(_) | MonitorError::HardwareFault(_)) => "Hardware",
        Some(_) => "Monitor",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    match calibration_failure(err) {
        Some(CalibrationFailure::SensorMissing(phases)) => {
            let phases: Vec<&str> = phases.iter().map(|p| p.label()).collect();
            json!({ "reason": reason_name(err), "details": { "phases": phases }, "message": msg })
        }
        Some(CalibrationFailure::NoiseTooHigh { noise_a, ceiling_a }) => json!({
            "reason": reason_name(err),
            "details": { "noise_a": noise_a, "ceiling_a": ceiling_a },
            "message": msg,
        }),
        None => json!({ "reason": reason_name(err), "message": msg }),
    }
    .to_string()
}
