//! Configuration types for the protection controller.
//!
//! These are the runtime configuration structs used by `Controller`.
//! They are separate from the TOML-deserialized config in `ampguard_config`;
//! defaults match the stock basic controller.

use crate::phase::{Phase, PhaseChannel};

/// Static ADC front-end parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcCfg {
    /// Full-scale reference voltage.
    pub vref: f32,
    /// Number of codes; raw readings are in `[0, resolution - 1]`.
    pub resolution: u32,
}

impl AdcCfg {
    #[inline]
    pub fn volts_per_count(&self) -> f32 {
        self.vref / self.resolution as f32
    }

    #[inline]
    pub fn max_code(&self) -> u16 {
        u16::try_from(self.resolution.saturating_sub(1)).unwrap_or(u16::MAX)
    }
}

impl Default for AdcCfg {
    fn default() -> Self {
        Self {
            vref: 3.3,
            resolution: 4096,
        }
    }
}

/// One averaging pass of the zero-point calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePass {
    /// Readings averaged into the zero point.
    pub samples: usize,
    /// Wait between consecutive readings.
    pub delay_ms: u64,
    /// Readings thrown away before averaging starts.
    pub discard: usize,
}

/// Zero-point calibration strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
    SingleStage(StagePass),
    /// Coarse pass to let the front end settle, then a precision pass that overwrites it.
    TwoStage { coarse: StagePass, fine: StagePass },
}

impl CalibrationMode {
    pub fn single_stage() -> Self {
        CalibrationMode::SingleStage(StagePass {
            samples: 1000,
            delay_ms: 1,
            discard: 0,
        })
    }

    pub fn two_stage() -> Self {
        CalibrationMode::TwoStage {
            coarse: StagePass {
                samples: 500,
                delay_ms: 5,
                discard: 100,
            },
            fine: StagePass {
                samples: 2000,
                delay_ms: 20,
                discard: 100,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub presence_samples: usize,
    pub presence_interval_ms: u64,
    /// A live sensor shows at least this much raw spread.
    pub min_span_counts: u16,
    /// Mean this close to either rail means floating or shorted input.
    pub rail_margin_counts: u16,
    /// Zero voltage assigned to phases without a sensor.
    pub default_zero_voltage: f32,
    pub mode: CalibrationMode,
    /// Granularity of progress events, in percent.
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
            mode: CalibrationMode::single_stage(),
            progress_step_pct: 10,
        }
    }
}

/// How the zero-load noise baseline becomes a gating threshold.
///
/// The two policies intentionally differ: `Basic` adds a fixed margin and can
/// reject calibration, `Advanced` is multiplicative only and always proceeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoisePolicy {
    /// Global level = running average of the cross-phase mean;
    /// `threshold = level * margin_factor + fixed_offset_a`.
    Basic {
        margin_factor: f32,
        fixed_offset_a: f32,
        ceiling_a: f32,
    },
    /// Per-phase level = running max of |current|; `threshold = max * margin_factor`.
    Advanced { margin_factor: f32 },
}

impl NoisePolicy {
    pub fn basic() -> Self {
        NoisePolicy::Basic {
            margin_factor: 1.5,
            fixed_offset_a: 0.2,
            ceiling_a: 0.5,
        }
    }

    pub fn advanced() -> Self {
        NoisePolicy::Advanced { margin_factor: 1.5 }
    }
}

#[derive(Debug, Clone)]
pub struct NoiseCfg {
    pub samples: usize,
    pub sample_delay_ms: u64,
    pub policy: NoisePolicy,
}

impl NoiseCfg {
    pub fn basic() -> Self {
        Self {
            samples: 1000,
            sample_delay_ms: 1,
            policy: NoisePolicy::basic(),
        }
    }

    pub fn advanced() -> Self {
        Self {
            samples: 100,
            sample_delay_ms: 1,
            policy: NoisePolicy::advanced(),
        }
    }
}

impl Default for NoiseCfg {
    fn default() -> Self {
        Self::basic()
    }
}

/// Trip limits and auto-restart policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionCfg {
    /// Trip when any phase exceeds this (strictly greater).
    pub overcurrent_trip_a: f32,
    /// Trip when any phase pair differs by more than this.
    pub imbalance_limit_a: f32,
    /// Imbalance is only evaluated above this average current.
    pub min_current_for_imbalance_a: f32,
    /// Restart requires the average current to be below this.
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlCfg {
    /// Blocking delay after each control cycle.
    pub cycle_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self { cycle_ms: 200 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftCfg {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for DriftCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 1_000,
        }
    }
}

/// Everything the controller needs besides its I/O collaborators.
#[derive(Debug, Clone)]
pub struct ControllerCfg {
    pub adc: AdcCfg,
    pub channels: [PhaseChannel; 3],
    pub calibration: CalibrationCfg,
    pub noise: NoiseCfg,
    pub protection: ProtectionCfg,
    pub control: ControlCfg,
    pub drift: DriftCfg,
}

impl ControllerCfg {
    /// Basic system: single-stage calibration, global noise gate, no drift monitor.
    pub fn basic(channels: [PhaseChannel; 3]) -> Self {
        Self {
            adc: AdcCfg::default(),
            channels,
            calibration: CalibrationCfg::default(),
            noise: NoiseCfg::basic(),
            protection: ProtectionCfg::default(),
            control: ControlCfg::default(),
            drift: DriftCfg::default(),
        }
    }

    /// Advanced system: two-stage calibration, per-phase thresholds, drift monitor on.
    pub fn advanced(channels: [PhaseChannel; 3]) -> Self {
        Self {
            calibration: CalibrationCfg {
                mode: CalibrationMode::two_stage(),
                ..CalibrationCfg::default()
            },
            noise: NoiseCfg::advanced(),
            drift: DriftCfg {
                enabled: true,
                ..DriftCfg::default()
            },
            ..Self::basic(channels)
        }
    }
}

impl Default for ControllerCfg {
    /// Three 20 A sensors on channels 0, 1 and 2.
    fn default() -> Self {
        Self::basic([
            PhaseChannel::rated(Phase::L1, 0, 20),
            PhaseChannel::rated(Phase::L2, 1, 20),
            PhaseChannel::rated(Phase::L3, 2, 20),
        ])
    }
}
