//! `From` implementations bridging `ampguard_config` types to `ampguard_core` types.

use crate::config::{
    AdcCfg, CalibrationCfg, CalibrationMode, ControlCfg, ControllerCfg, DriftCfg, NoiseCfg,
    NoisePolicy, ProtectionCfg, StagePass,
};
use crate::phase::{PHASE_COUNT, Phase, PhaseChannel};
use ampguard_config::Variant;

// ── AdcCfg ───────────────────────────────────────────────────────────────────

impl From<&ampguard_config::AdcCfg> for AdcCfg {
    fn from(c: &ampguard_config::AdcCfg) -> Self {
        Self {
            vref: c.vref,
            resolution: c.resolution,
        }
    }
}

// ── Phases ───────────────────────────────────────────────────────────────────

/// Sensor wiring in L1, L2, L3 order.
pub fn channels_from(c: &ampguard_config::PhasesCfg) -> [PhaseChannel; PHASE_COUNT] {
    let cfgs = c.as_array();
    Phase::ALL.map(|phase| {
        let p = &cfgs[phase.index()];
        PhaseChannel {
            phase,
            sensor_pin_id: p.pin,
            sensitivity_v_per_a: p.sensitivity(),
            rated_amps: p.rated_amps,
        }
    })
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

/// The file carries both calibration recipes; the variant picks one.
fn calibration_from(c: &ampguard_config::CalibrationCfg, variant: Variant) -> CalibrationCfg {
    let mode = match variant {
        Variant::Basic => CalibrationMode::SingleStage(StagePass {
            samples: c.single_samples,
            delay_ms: c.single_delay_ms,
            discard: 0,
        }),
        Variant::Advanced => CalibrationMode::TwoStage {
            coarse: StagePass {
                samples: c.coarse_samples,
                delay_ms: c.coarse_delay_ms,
                discard: c.warmup_discard,
            },
            fine: StagePass {
                samples: c.fine_samples,
                delay_ms: c.fine_delay_ms,
                discard: c.warmup_discard,
            },
        },
    };
    CalibrationCfg {
        presence_samples: c.presence_samples,
        presence_interval_ms: c.presence_interval_ms,
        min_span_counts: c.min_span_counts,
        rail_margin_counts: c.rail_margin_counts,
        default_zero_voltage: c.default_zero_voltage,
        mode,
        progress_step_pct: c.progress_step_pct,
    }
}

fn noise_from(c: &ampguard_config::NoiseCfg, variant: Variant) -> NoiseCfg {
    match variant {
        Variant::Basic => NoiseCfg {
            samples: c.basic_samples,
            sample_delay_ms: c.sample_delay_ms,
            policy: NoisePolicy::Basic {
                margin_factor: c.margin_factor,
                fixed_offset_a: c.fixed_offset_a,
                ceiling_a: c.ceiling_a,
            },
        },
        Variant::Advanced => NoiseCfg {
            samples: c.advanced_samples,
            sample_delay_ms: c.sample_delay_ms,
            policy: NoisePolicy::Advanced {
                margin_factor: c.margin_factor,
            },
        },
    }
}

// ── ProtectionCfg ────────────────────────────────────────────────────────────

impl From<&ampguard_config::ProtectionCfg> for ProtectionCfg {
    fn from(c: &ampguard_config::ProtectionCfg) -> Self {
        Self {
            overcurrent_trip_a: c.overcurrent_trip_a,
            imbalance_limit_a: c.imbalance_limit_a,
            min_current_for_imbalance_a: c.min_current_for_imbalance_a,
            restart_threshold_a: c.restart_threshold_a,
            lockout_ms: c.lockout_ms,
            max_trip_count: c.max_trip_count,
            trip_reset_ms: c.trip_reset_ms,
        }
    }
}

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&ampguard_config::ControlCfg> for ControlCfg {
    fn from(c: &ampguard_config::ControlCfg) -> Self {
        Self {
            cycle_ms: c.cycle_ms,
        }
    }
}

// ── ControllerCfg ────────────────────────────────────────────────────────────

impl From<&ampguard_config::Config> for ControllerCfg {
    fn from(c: &ampguard_config::Config) -> Self {
        let variant = c.system.variant;
        Self {
            adc: AdcCfg::from(&c.adc),
            channels: channels_from(&c.phases),
            calibration: calibration_from(&c.calibration, variant),
            noise: noise_from(&c.noise, variant),
            protection: ProtectionCfg::from(&c.protection),
            control: ControlCfg::from(&c.control),
            drift: DriftCfg {
                enabled: c.drift_enabled(),
                interval_ms: c.drift.interval_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: &str = r#"
        [phases]
        l1 = { pin = 34, rated_amps = 20 }
        l2 = { pin = 35, rated_amps = 20 }
        l3 = { pin = 32, rated_amps = 30 }
    "#;

    #[test]
    fn basic_variant_maps_single_stage_and_global_gate() {
        let cfg = ampguard_config::load_toml(MIN).unwrap();
        let c = ControllerCfg::from(&cfg);
        assert_eq!(c.calibration.mode, CalibrationMode::single_stage());
        assert_eq!(c.noise.policy, NoisePolicy::basic());
        assert_eq!(c.noise.samples, 1000);
        assert!(!c.drift.enabled);
        assert_eq!(c.channels[2].sensor_pin_id, 32);
        assert!((c.channels[2].sensitivity_v_per_a - 0.066).abs() < 1e-6);
    }

    #[test]
    fn advanced_variant_maps_two_stage_and_drift() {
        let src = format!("[system]\nvariant = \"advanced\"\n{MIN}");
        let cfg = ampguard_config::load_toml(&src).unwrap();
        let c = ControllerCfg::from(&cfg);
        assert_eq!(c.calibration.mode, CalibrationMode::two_stage());
        assert_eq!(c.noise.policy, NoisePolicy::advanced());
        assert_eq!(c.noise.samples, 100);
        assert!(c.drift.enabled);
    }

    #[test]
    fn channels_keep_per_phase_pins_and_ratings() {
        let cfg = ampguard_config::load_toml(MIN).unwrap();
        let ch = channels_from(&cfg.phases);
        assert_eq!(ch.map(|c| c.phase), Phase::ALL);
        assert_eq!(ch.map(|c| c.sensor_pin_id), [34, 35, 32]);
        assert_eq!(ch.map(|c| c.rated_amps), [20, 20, 30]);
        assert!((ch[0].sensitivity_v_per_a - 0.100).abs() < 1e-6);
        assert!((ch[2].sensitivity_v_per_a - 0.066).abs() < 1e-6);
    }
}
