//! Startup calibration: sensor presence and zero-current voltage per phase.
//!
//! All waits go through the injected `Clock`, so tests run in virtual time.
//! Averaging passes are interleaved across phases: every iteration reads each
//! connected channel once and then sleeps for the pass delay.

use ampguard_traits::{AnalogInput, Clock};

use crate::config::{CalibrationCfg, CalibrationMode, StagePass};
use crate::error::CalibrationFailure;
use crate::events::{CalibrationStage, DiagnosticEvent, DiagnosticSink};
use crate::phase::{PHASE_COUNT, Phase, PhaseChannel};
use crate::sampler::Sampler;
use crate::util::ProgressTracker;

/// Zero reference and presence of one phase's sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    pub zero_voltage: f32,
    pub connected: bool,
}

impl CalibrationState {
    /// Placeholder for a phase without a usable sensor.
    pub fn disconnected(default_zero_voltage: f32) -> Self {
        Self {
            zero_voltage: default_zero_voltage,
            connected: false,
        }
    }
}

/// Raw-count statistics of a presence check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceStats {
    pub min: u16,
    pub max: u16,
    pub mean: f32,
}

impl PresenceStats {
    pub fn from_samples(samples: &[u16]) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let sum: u64 = samples.iter().map(|&s| u64::from(s)).sum();
        Some(Self {
            min,
            max,
            mean: sum as f32 / samples.len() as f32,
        })
    }

    #[inline]
    pub fn span(&self) -> u16 {
        self.max.saturating_sub(self.min)
    }

    /// A live Hall sensor shows noise and sits away from both rails.
    ///
    /// Disconnected when the span is below `min_span`, or the mean is within
    /// `rail_margin` counts of 0 or of `resolution`.
    pub fn looks_connected(&self, min_span: u16, rail_margin: u16, resolution: u32) -> bool {
        let low = f32::from(rail_margin);
        let high = resolution.saturating_sub(u32::from(rail_margin)) as f32;
        self.span() >= min_span && self.mean >= low && self.mean <= high
    }
}

/// Result of a full startup calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    pub states: [CalibrationState; PHASE_COUNT],
    /// `Err` when any phase lacks a sensor; zero points were not measured.
    pub verdict: Result<(), CalibrationFailure>,
}

pub struct Calibrator<'a> {
    cfg: &'a CalibrationCfg,
    clock: &'a dyn Clock,
}

impl<'a> Calibrator<'a> {
    pub fn new(cfg: &'a CalibrationCfg, clock: &'a dyn Clock) -> Self {
        Self { cfg, clock }
    }

    /// Sample one channel `presence_samples` times and classify it.
    pub fn check_sensor_presence<A: AnalogInput>(
        &self,
        sampler: &mut Sampler<A>,
        channel: &PhaseChannel,
    ) -> crate::Result<(bool, PresenceStats)> {
        let n = self.cfg.presence_samples.max(1);
        let mut raw = Vec::with_capacity(n);
        for i in 0..n {
            raw.push(sampler.read_raw(channel.sensor_pin_id)?);
            if i + 1 < n {
                self.clock.sleep_ms(self.cfg.presence_interval_ms);
            }
        }
        let stats = PresenceStats::from_samples(&raw).unwrap_or(PresenceStats {
            min: 0,
            max: 0,
            mean: 0.0,
        });
        let connected = stats.looks_connected(
            self.cfg.min_span_counts,
            self.cfg.rail_margin_counts,
            sampler.adc_cfg().resolution,
        );
        tracing::debug!(
            phase = %channel.phase,
            min = stats.min,
            max = stats.max,
            mean = stats.mean,
            connected,
            "sensor presence"
        );
        Ok((connected, stats))
    }

    /// Average one pass over `channels` and return each zero voltage, in input order.
    pub fn calibrate_zero<A: AnalogInput>(
        &self,
        sampler: &mut Sampler<A>,
        channels: &[PhaseChannel],
        pass: &StagePass,
        stage: CalibrationStage,
        sink: &mut dyn DiagnosticSink,
    ) -> crate::Result<Vec<f32>> {
        for _ in 0..pass.discard {
            for ch in channels {
                sampler.read_raw(ch.sensor_pin_id)?;
            }
            self.clock.sleep_ms(pass.delay_ms);
        }

        let samples = pass.samples.max(1);
        let mut sums = vec![0u64; channels.len()];
        let mut progress = ProgressTracker::new(samples, self.cfg.progress_step_pct);
        for i in 0..samples {
            for (sum, ch) in sums.iter_mut().zip(channels) {
                *sum += u64::from(sampler.read_raw(ch.sensor_pin_id)?);
            }
            self.clock.sleep_ms(pass.delay_ms);
            if let Some(percent) = progress.advance(i + 1) {
                sink.emit(&DiagnosticEvent::CalibrationProgress { stage, percent });
            }
        }

        let zeros = sums
            .iter()
            .map(|&s| sampler.counts_to_volts(s as f32 / samples as f32))
            .collect::<Vec<_>>();
        for (ch, &zero_voltage) in channels.iter().zip(&zeros) {
            tracing::info!(phase = %ch.phase, ?stage, zero_v = zero_voltage, "zero point");
            sink.emit(&DiagnosticEvent::ZeroPoint {
                phase: ch.phase,
                stage,
                zero_voltage,
            });
        }
        Ok(zeros)
    }

    /// Presence check on every phase, then zero calibration if all sensors answered.
    ///
    /// Missing phases keep the default zero voltage and `connected = false`.
    pub fn run<A: AnalogInput>(
        &self,
        sampler: &mut Sampler<A>,
        channels: &[PhaseChannel; PHASE_COUNT],
        sink: &mut dyn DiagnosticSink,
    ) -> crate::Result<CalibrationOutcome> {
        let mut states = [CalibrationState::disconnected(self.cfg.default_zero_voltage); PHASE_COUNT];
        let mut missing = Vec::new();
        for ch in channels {
            let (connected, stats) = self.check_sensor_presence(sampler, ch)?;
            sink.emit(&DiagnosticEvent::SensorPresence {
                phase: ch.phase,
                connected,
                stats,
            });
            states[ch.phase.index()].connected = connected;
            if !connected {
                missing.push(ch.phase);
            }
        }

        if !missing.is_empty() {
            tracing::error!(?missing, "current sensor missing; calibration abandoned");
            return Ok(CalibrationOutcome {
                states,
                verdict: Err(CalibrationFailure::SensorMissing(missing)),
            });
        }

        let live: Vec<PhaseChannel> = channels
            .iter()
            .copied()
            .filter(|c| states[c.phase.index()].connected)
            .collect();
        let passes: Vec<(StagePass, CalibrationStage)> = match self.cfg.mode {
            CalibrationMode::SingleStage(p) => vec![(p, CalibrationStage::Zero)],
            CalibrationMode::TwoStage { coarse, fine } => vec![
                (coarse, CalibrationStage::Coarse),
                (fine, CalibrationStage::Fine),
            ],
        };
        for (pass, stage) in &passes {
            let zeros = self.calibrate_zero(sampler, &live, pass, *stage, sink)?;
            // later passes overwrite earlier ones
            for (ch, z) in live.iter().zip(zeros) {
                states[ch.phase.index()].zero_voltage = z;
            }
        }

        Ok(CalibrationOutcome {
            states,
            verdict: Ok(()),
        })
    }
}

/// Phases whose sensor is absent, in scan order.
pub fn missing_phases(states: &[CalibrationState; PHASE_COUNT]) -> Vec<Phase> {
    Phase::ALL
        .into_iter()
        .filter(|p| !states[p.index()].connected)
        .collect()
}
