//! Periodic zero-drift check. Observational only.

use ampguard_traits::AnalogInput;

use crate::calibration::CalibrationState;
use crate::config::DriftCfg;
use crate::noise::NoiseProfile;
use crate::phase::{PHASE_COUNT, Phase, PhaseChannel};
use crate::sampler::Sampler;
use crate::util::elapsed_ms;

/// One phase whose instantaneous zero-referenced current exceeded its threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftWarning {
    pub phase: Phase,
    pub current_a: f32,
    pub threshold_a: f32,
}

#[derive(Debug, Clone)]
pub struct DriftMonitor {
    cfg: DriftCfg,
}

impl DriftMonitor {
    pub fn new(cfg: DriftCfg) -> Self {
        Self { cfg }
    }

    pub fn enabled(&self) -> bool {
        self.cfg.enabled
    }

    /// Time-based cadence: due once `interval_ms` has passed since the last check.
    pub fn is_due(&self, now_ms: u64, last_check_ms: u64) -> bool {
        self.cfg.enabled && elapsed_ms(now_ms, last_check_ms) >= self.cfg.interval_ms
    }

    /// Read every connected phase once and compare against its noise threshold.
    pub fn check<A: AnalogInput>(
        &self,
        sampler: &mut Sampler<A>,
        channels: &[PhaseChannel; PHASE_COUNT],
        cal: &[CalibrationState; PHASE_COUNT],
        noise: &NoiseProfile,
    ) -> crate::Result<Vec<DriftWarning>> {
        let mut warnings = Vec::new();
        for ch in channels {
            let state = &cal[ch.phase.index()];
            if !state.connected {
                continue;
            }
            let current_a = sampler.read_current(ch, state)?;
            let threshold_a = noise.threshold(ch.phase);
            if current_a > threshold_a {
                tracing::warn!(phase = %ch.phase, current_a, threshold_a, "zero drift");
                warnings.push(DriftWarning {
                    phase: ch.phase,
                    current_a,
                    threshold_a,
                });
            }
        }
        Ok(warnings)
    }
}
