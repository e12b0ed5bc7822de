//! Zero-load noise baseline and the gating thresholds derived from it.

use ampguard_traits::{AnalogInput, Clock};

use crate::calibration::CalibrationState;
use crate::config::{NoiseCfg, NoisePolicy};
use crate::error::CalibrationFailure;
use crate::events::{CalibrationStage, DiagnosticEvent, DiagnosticSink};
use crate::phase::{PHASE_COUNT, Phase, PhaseChannel, PhaseValues};
use crate::sampler::Sampler;
use crate::util::ProgressTracker;

/// Measured noise, global (basic policy) or per phase (advanced policy).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseLevel {
    Global(f32),
    PerPhase(PhaseValues),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    pub level: NoiseLevel,
    /// Gating threshold per phase; identical entries under the basic policy.
    pub thresholds: PhaseValues,
}

impl NoiseProfile {
    #[inline]
    pub fn threshold(&self, phase: Phase) -> f32 {
        self.thresholds[phase.index()]
    }

    /// Largest measured level, used for reporting.
    pub fn peak_level(&self) -> f32 {
        match self.level {
            NoiseLevel::Global(n) => n,
            NoiseLevel::PerPhase(v) => v.iter().copied().fold(0.0, f32::max),
        }
    }
}

impl NoisePolicy {
    /// `level * margin + offset`, same threshold on every phase.
    pub fn profile_from_global(&self, level: f32) -> NoiseProfile {
        let t = match *self {
            NoisePolicy::Basic {
                margin_factor,
                fixed_offset_a,
                ..
            } => level * margin_factor + fixed_offset_a,
            NoisePolicy::Advanced { margin_factor } => level * margin_factor,
        };
        NoiseProfile {
            level: NoiseLevel::Global(level),
            thresholds: [t; PHASE_COUNT],
        }
    }

    /// `max_i * margin`, no additive term.
    pub fn profile_from_per_phase(&self, max: PhaseValues) -> NoiseProfile {
        let margin = match *self {
            NoisePolicy::Basic { margin_factor, .. } | NoisePolicy::Advanced { margin_factor } => {
                margin_factor
            }
        };
        NoiseProfile {
            level: NoiseLevel::PerPhase(max),
            thresholds: max.map(|m| m * margin),
        }
    }

    /// Basic policy rejects a global level strictly above the ceiling.
    pub fn accept(&self, profile: &NoiseProfile) -> Result<(), CalibrationFailure> {
        match (*self, profile.level) {
            (NoisePolicy::Basic { ceiling_a, .. }, NoiseLevel::Global(noise_a))
                if noise_a > ceiling_a =>
            {
                Err(CalibrationFailure::NoiseTooHigh { noise_a, ceiling_a })
            }
            _ => Ok(()),
        }
    }
}

pub struct NoiseAnalyzer<'a> {
    cfg: &'a NoiseCfg,
    clock: &'a dyn Clock,
    progress_step_pct: u8,
}

impl<'a> NoiseAnalyzer<'a> {
    pub fn new(cfg: &'a NoiseCfg, clock: &'a dyn Clock, progress_step_pct: u8) -> Self {
        Self {
            cfg,
            clock,
            progress_step_pct,
        }
    }

    /// Sample zero-calibrated current on every connected phase and build the profile.
    ///
    /// The profile is returned even when the policy would reject it; call
    /// [`NoisePolicy::accept`] to apply the ceiling.
    pub fn analyze_noise<A: AnalogInput>(
        &self,
        sampler: &mut Sampler<A>,
        channels: &[PhaseChannel; PHASE_COUNT],
        cal: &[CalibrationState; PHASE_COUNT],
        sink: &mut dyn DiagnosticSink,
    ) -> crate::Result<NoiseProfile> {
        let samples = self.cfg.samples.max(1);
        let live = cal.iter().filter(|c| c.connected).count().max(1) as f32;
        let mut mean_sum = 0.0f64;
        let mut max = [0.0f32; PHASE_COUNT];
        let mut progress = ProgressTracker::new(samples, self.progress_step_pct);

        for n in 0..samples {
            let mut cycle_sum = 0.0f32;
            for ch in channels {
                let i = ch.phase.index();
                let amps = sampler.read_current(ch, &cal[i])?;
                cycle_sum += amps;
                max[i] = max[i].max(amps);
            }
            mean_sum += f64::from(cycle_sum / live);
            self.clock.sleep_ms(self.cfg.sample_delay_ms);
            if let Some(percent) = progress.advance(n + 1) {
                sink.emit(&DiagnosticEvent::CalibrationProgress {
                    stage: CalibrationStage::Noise,
                    percent,
                });
            }
        }

        let profile = match self.cfg.policy {
            NoisePolicy::Basic { .. } => {
                let level = (mean_sum / samples as f64) as f32;
                self.cfg.policy.profile_from_global(level)
            }
            NoisePolicy::Advanced { .. } => self.cfg.policy.profile_from_per_phase(max),
        };
        tracing::info!(
            noise_a = profile.peak_level(),
            thresholds = ?profile.thresholds,
            "noise profile"
        );
        Ok(profile)
    }
}
