#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and raw-trace parsing for the protection controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section except `[phases]` defaults to the stock controller constants.
//! - Raw ADC traces (CSV, `l1,l2,l3`) feed the replay backend.
use serde::Deserialize;

/// Which controller flavour to run.
///
/// `basic`: single-stage zero calibration, global noise threshold with an absolute
/// ceiling, no drift monitor.
/// `advanced`: two-stage zero calibration, per-phase noise thresholds, drift monitor.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Basic,
    Advanced,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SystemCfg {
    pub variant: Variant,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdcCfg {
    /// Full-scale reference voltage at the configured attenuation.
    pub vref: f32,
    /// Number of codes (4096 for a 12-bit converter).
    pub resolution: u32,
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            vref: 3.3,
            resolution: 4096,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PhaseCfg {
    /// ADC channel (sensor pin) wired to this phase.
    pub pin: u8,
    /// Sensor range in amperes; 20 or 30.
    pub rated_amps: u32,
    /// Overrides the nominal sensitivity derived from `rated_amps`.
    #[serde(default)]
    pub sensitivity_v_per_a: Option<f32>,
}

impl PhaseCfg {
    /// Volts per ampere for this sensor.
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity_v_per_a
            .unwrap_or_else(|| nominal_sensitivity(self.rated_amps).unwrap_or(0.0))
    }
}

/// Datasheet sensitivity of the supported Hall sensor ranges.
pub fn nominal_sensitivity(rated_amps: u32) -> Option<f32> {
    match rated_amps {
        20 => Some(0.100),
        30 => Some(0.066),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct PhasesCfg {
    pub l1: PhaseCfg,
    pub l2: PhaseCfg,
    pub l3: PhaseCfg,
}

impl PhasesCfg {
    /// Phases in scan order L1, L2, L3.
    pub fn as_array(&self) -> [PhaseCfg; 3] {
        [self.l1, self.l2, self.l3]
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RelayCfg {
    pub pin: u8,
    /// Drive the output low to energize the load.
    pub active_low: bool,
}

impl Default for RelayCfg {
    fn default() -> Self {
        Self {
            pin: 26,
            active_low: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub presence_samples: usize,
    pub presence_interval_ms: u64,
    /// Minimum raw span (max - min) expected from a live sensor.
    pub min_span_counts: u16,
    /// Mean within this many counts of either rail means floating or shorted input.
    pub rail_margin_counts: u16,
    /// Zero voltage assigned to phases without a sensor.
    pub default_zero_voltage: f32,
    pub single_samples: usize,
    pub single_delay_ms: u64,
    /// Warm-up samples dropped before each two-stage pass.
    pub warmup_discard: usize,
    pub coarse_samples: usize,
    pub coarse_delay_ms: u64,
    pub fine_samples: usize,
    pub fine_delay_ms: u64,
    /// Granularity of calibration progress events, in percent.
    pub progress_step_pct: u8,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            presence_samples: 20,
            presence_interval_ms: 10,
            min_span_counts: 5,
            rail_margin_counts: 10,
            default_zero_voltage: 2.5,
            single_samples: 1000,
            single_delay_ms: 1,
            warmup_discard: 100,
            coarse_samples: 500,
            coarse_delay_ms: 5,
            fine_samples: 2000,
            fine_delay_ms: 20,
            progress_step_pct: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NoiseCfg {
    pub basic_samples: usize,
    pub advanced_samples: usize,
    pub sample_delay_ms: u64,
    pub margin_factor: f32,
    /// Additive margin used by the basic policy only.
    pub fixed_offset_a: f32,
    /// Basic policy rejects calibration above this noise level.
    pub ceiling_a: f32,
}

impl Default for NoiseCfg {
    fn default() -> Self {
        Self {
            basic_samples: 1000,
            advanced_samples: 100,
            sample_delay_ms: 1,
            margin_factor: 1.5,
            fixed_offset_a: 0.2,
            ceiling_a: 0.5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProtectionCfg {
    pub overcurrent_trip_a: f32,
    pub imbalance_limit_a: f32,
    pub min_current_for_imbalance_a: f32,
    pub restart_threshold_a: f32,
    pub lockout_ms: u64,
    pub max_trip_count: u16,
    pub trip_reset_ms: u64,
}

impl Default for ProtectionCfg {
    fn default() -> Self {
        Self {
            overcurrent_trip_a: 7.0,
            imbalance_limit_a: 1.0,
            min_current_for_imbalance_a: 0.5,
            restart_threshold_a: 2.0,
            lockout_ms: 5_000,
            max_trip_count: 3,
            trip_reset_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlCfg {
    /// Delay between control cycles.
    pub cycle_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { cycle_ms: 200 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DriftCfg {
    /// Defaults to on for the advanced variant and off for basic.
    pub enabled: Option<bool>,
    pub interval_ms: u64,
}

impl Default for DriftCfg {
    fn default() -> Self {
        Self {
            enabled: None,
            interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub system: SystemCfg,
    #[serde(default)]
    pub adc: AdcCfg,
    pub phases: PhasesCfg,
    #[serde(default)]
    pub relay: RelayCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub noise: NoiseCfg,
    #[serde(default)]
    pub protection: ProtectionCfg,
    #[serde(default)]
    pub control: ControlCfg,
    #[serde(default)]
    pub drift: DriftCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    /// Whether the drift monitor runs for this configuration.
    pub fn drift_enabled(&self) -> bool {
        self.drift
            .enabled
            .unwrap_or(self.system.variant == Variant::Advanced)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // ADC
        if !(self.adc.vref.is_finite() && self.adc.vref > 0.0) {
            eyre::bail!("adc.vref must be > 0");
        }
        if !(256..=65_536).contains(&self.adc.resolution) {
            eyre::bail!("adc.resolution must be in [256, 65536]");
        }

        // Phases
        let phases = self.phases.as_array();
        for (name, p) in ["l1", "l2", "l3"].iter().zip(phases.iter()) {
            match p.sensitivity_v_per_a {
                Some(s) if !(s.is_finite() && s > 0.0) => {
                    eyre::bail!("phases.{name}.sensitivity_v_per_a must be > 0");
                }
                Some(_) => {}
                None => {
                    if nominal_sensitivity(p.rated_amps).is_none() {
                        eyre::bail!(
                            "phases.{name}.rated_amps must be 20 or 30 (got {})",
                            p.rated_amps
                        );
                    }
                }
            }
        }
        if phases[0].pin == phases[1].pin
            || phases[0].pin == phases[2].pin
            || phases[1].pin == phases[2].pin
        {
            eyre::bail!("phases must use distinct pins");
        }

        // Calibration
        let cal = &self.calibration;
        if cal.presence_samples < 2 {
            eyre::bail!("calibration.presence_samples must be >= 2");
        }
        if cal.single_samples == 0 || cal.coarse_samples == 0 || cal.fine_samples == 0 {
            eyre::bail!("calibration sample counts must be >= 1");
        }
        if !(cal.default_zero_voltage.is_finite()
            && cal.default_zero_voltage >= 0.0
            && cal.default_zero_voltage <= self.adc.vref.max(5.0))
        {
            eyre::bail!("calibration.default_zero_voltage is out of range");
        }
        if cal.progress_step_pct == 0 || cal.progress_step_pct > 100 {
            eyre::bail!("calibration.progress_step_pct must be in [1, 100]");
        }
        if u32::from(cal.rail_margin_counts) * 2 >= self.adc.resolution {
            eyre::bail!("calibration.rail_margin_counts leaves no valid range");
        }

        // Noise
        if self.noise.basic_samples == 0 || self.noise.advanced_samples == 0 {
            eyre::bail!("noise sample counts must be >= 1");
        }
        if !(self.noise.margin_factor.is_finite() && self.noise.margin_factor >= 1.0) {
            eyre::bail!("noise.margin_factor must be >= 1.0");
        }
        if self.noise.fixed_offset_a.is_sign_negative() {
            eyre::bail!("noise.fixed_offset_a must be >= 0");
        }
        if !(self.noise.ceiling_a.is_finite() && self.noise.ceiling_a > 0.0) {
            eyre::bail!("noise.ceiling_a must be > 0");
        }

        // Protection
        let p = &self.protection;
        if !(p.overcurrent_trip_a.is_finite() && p.overcurrent_trip_a > 0.0) {
            eyre::bail!("protection.overcurrent_trip_a must be > 0");
        }
        if !(p.imbalance_limit_a.is_finite() && p.imbalance_limit_a > 0.0) {
            eyre::bail!("protection.imbalance_limit_a must be > 0");
        }
        if p.min_current_for_imbalance_a.is_sign_negative() {
            eyre::bail!("protection.min_current_for_imbalance_a must be >= 0");
        }
        if !(p.restart_threshold_a > 0.0 && p.restart_threshold_a < p.overcurrent_trip_a) {
            eyre::bail!("protection.restart_threshold_a must be in (0, overcurrent_trip_a)");
        }
        if p.max_trip_count == 0 {
            eyre::bail!("protection.max_trip_count must be >= 1");
        }
        if p.trip_reset_ms <= p.lockout_ms {
            eyre::bail!("protection.trip_reset_ms must exceed protection.lockout_ms");
        }

        // Control
        if self.control.cycle_ms == 0 {
            eyre::bail!("control.cycle_ms must be >= 1");
        }
        if self.control.cycle_ms > 60_000 {
            eyre::bail!("control.cycle_ms is unreasonably large (>60s)");
        }

        // Drift
        if self.drift.interval_ms == 0 {
            eyre::bail!("drift.interval_ms must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

/// One frame of raw ADC codes, in phase order.
///
/// Expected headers:
/// l1,l2,l3
///
/// Example:
/// l1,l2,l3
/// 3103,3101,3104
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TraceRow {
    pub l1: u16,
    pub l2: u16,
    pub l3: u16,
}

impl TraceRow {
    pub fn as_array(&self) -> [u16; 3] {
        [self.l1, self.l2, self.l3]
    }
}

pub fn load_raw_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open raw trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["l1", "l2", "l3"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "raw trace CSV must have headers 'l1,l2,l3', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("raw trace CSV {:?} has no rows", path);
    }
    Ok(rows)
}
