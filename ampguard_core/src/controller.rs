//! The protection control loop (`Controller`).
//!
//! Startup runs presence check, zero calibration and noise analysis once.
//! Afterwards every cycle does measure → detect → update protection → report,
//! plus the drift check when it is due. A failed startup is terminal for the
//! lifetime of the controller.

use std::sync::Arc;
use std::time::Instant;

use ampguard_traits::{AnalogInput, Clock, LoadSwitch};

use crate::calibration::{CalibrationState, Calibrator};
use crate::config::ControllerCfg;
use crate::drift::DriftMonitor;
use crate::error::{CalibrationFailure, MonitorError, Result};
use crate::events::{DiagnosticEvent, DiagnosticSink};
use crate::fault::FaultDetector;
use crate::filter::{CurrentFilter, average_current};
use crate::noise::{NoiseAnalyzer, NoiseProfile};
use crate::phase::{PHASE_COUNT, PhaseValues};
use crate::protection::{ProtectionState, ProtectionStateMachine, Transition};
use crate::sampler::Sampler;
use crate::status::{CycleReport, CycleStatus, LoadStatus};

/// Degraded diagnostics are repeated every this many cycles.
pub const DEGRADED_REPORT_EVERY: u64 = 25;

/// Startup gate. `Degraded` is terminal.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SystemReadiness {
    #[default]
    Pending,
    Ready,
    Degraded(CalibrationFailure),
}

impl SystemReadiness {
    #[inline]
    pub fn calibration_ok(&self) -> bool {
        matches!(self, SystemReadiness::Ready)
    }
}

/// All mutable controller state, owned in one place.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub calibration: [CalibrationState; PHASE_COUNT],
    pub noise: Option<NoiseProfile>,
    pub filter: CurrentFilter,
    pub protection: ProtectionState,
    pub readiness: SystemReadiness,
    pub drift_last_check_ms: u64,
    pub cycles: u64,
}

impl ControllerState {
    fn new(default_zero_voltage: f32) -> Self {
        Self {
            calibration: [CalibrationState::disconnected(default_zero_voltage); PHASE_COUNT],
            noise: None,
            filter: CurrentFilter::new(),
            protection: ProtectionState::default(),
            readiness: SystemReadiness::Pending,
            drift_last_check_ms: 0,
            cycles: 0,
        }
    }
}

pub struct Controller<A: AnalogInput, R: LoadSwitch> {
    pub(crate) sampler: Sampler<A>,
    pub(crate) relay: R,
    pub(crate) cfg: ControllerCfg,
    pub(crate) detector: FaultDetector,
    pub(crate) protection: ProtectionStateMachine,
    pub(crate) drift: DriftMonitor,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) sink: Box<dyn DiagnosticSink>,
    pub(crate) state: ControllerState,
}

impl<A: AnalogInput, R: LoadSwitch> core::fmt::Debug for Controller<A, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Controller")
            .field("readiness", &self.state.readiness)
            .field("load_connected", &self.state.protection.load_connected)
            .field("trip_count", &self.state.protection.trip_count)
            .field("cycles", &self.state.cycles)
            .finish()
    }
}

impl<A: AnalogInput, R: LoadSwitch> Controller<A, R> {
    pub(crate) fn new(
        adc: A,
        relay: R,
        cfg: ControllerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        sink: Box<dyn DiagnosticSink>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            sampler: Sampler::new(adc, cfg.adc),
            relay,
            detector: FaultDetector::new(&cfg.protection),
            protection: ProtectionStateMachine::new(cfg.protection.clone()),
            drift: DriftMonitor::new(cfg.drift),
            state: ControllerState::new(cfg.calibration.default_zero_voltage),
            cfg,
            clock,
            epoch,
            sink,
        }
    }

    pub fn cfg(&self) -> &ControllerCfg {
        &self.cfg
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn readiness(&self) -> &SystemReadiness {
        &self.state.readiness
    }

    /// Milliseconds since the controller was built, on the injected clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn load_status(&self) -> LoadStatus {
        self.protection
            .load_status(&self.state.protection, self.now_ms())
    }

    /// Calibrate once and connect the load if everything checks out.
    ///
    /// Calibration failures are not errors: they put the controller in
    /// degraded mode and are reported through the sink. Errors are I/O only.
    pub fn startup(&mut self) -> Result<&SystemReadiness> {
        if self.state.readiness != SystemReadiness::Pending {
            return Err(eyre::Report::new(MonitorError::State(
                "startup already ran".into(),
            )));
        }
        // the relay stays open until calibration has passed
        self.protection
            .disarm(&mut self.state.protection, &mut self.relay)?;

        let calibrator = Calibrator::new(&self.cfg.calibration, &*self.clock);
        let outcome =
            calibrator.run(&mut self.sampler, &self.cfg.channels, self.sink.as_mut())?;
        self.state.calibration = outcome.states;
        if let Err(failure) = outcome.verdict {
            return Ok(self.degrade(failure));
        }

        let analyzer = NoiseAnalyzer::new(
            &self.cfg.noise,
            &*self.clock,
            self.cfg.calibration.progress_step_pct,
        );
        let profile = analyzer.analyze_noise(
            &mut self.sampler,
            &self.cfg.channels,
            &self.state.calibration,
            self.sink.as_mut(),
        )?;
        self.sink.emit(&DiagnosticEvent::NoiseProfile(profile));
        self.state.noise = Some(profile);
        if let Err(failure) = self.cfg.noise.policy.accept(&profile) {
            return Ok(self.degrade(failure));
        }

        self.protection
            .arm(&mut self.state.protection, &mut self.relay)?;
        self.state.readiness = SystemReadiness::Ready;
        self.state.drift_last_check_ms = self.now_ms();
        self.sink.emit(&DiagnosticEvent::Ready);
        Ok(&self.state.readiness)
    }

    fn degrade(&mut self, failure: CalibrationFailure) -> &SystemReadiness {
        tracing::error!(error = %failure, "calibration failed; entering degraded mode");
        self.sink
            .emit(&DiagnosticEvent::CalibrationFailed(failure.clone()));
        self.state.readiness = SystemReadiness::Degraded(failure);
        &self.state.readiness
    }

    /// One control iteration without the inter-cycle delay.
    pub fn cycle(&mut self) -> Result<CycleStatus> {
        let noise = match &self.state.readiness {
            SystemReadiness::Pending => {
                return Err(eyre::Report::new(MonitorError::State(
                    "cycle before startup".into(),
                )));
            }
            SystemReadiness::Degraded(failure) => {
                let failure = failure.clone();
                if self.state.cycles % DEGRADED_REPORT_EVERY == 0 {
                    self.sink.emit(&DiagnosticEvent::Degraded(failure.clone()));
                }
                self.state.cycles += 1;
                return Ok(CycleStatus::Degraded(failure));
            }
            SystemReadiness::Ready => self.state.noise.ok_or_else(|| {
                eyre::Report::new(MonitorError::State("ready without noise profile".into()))
            })?,
        };

        let samples = self.sample_currents()?;
        let currents = self.state.filter.measure_all(&samples, &noise);
        let average = average_current(&currents);
        let fault = self.detector.evaluate(&currents, average);
        let now = self.now_ms();
        let transition = self.protection.update(
            &mut self.state.protection,
            now,
            fault,
            average,
            &mut self.relay,
        )?;

        self.sink
            .emit(&DiagnosticEvent::Readings { currents, average });
        match transition {
            Transition::Tripped(fault) => self.sink.emit(&DiagnosticEvent::Trip {
                fault,
                trip_count: self.state.protection.trip_count,
            }),
            Transition::Reconnected { amnesty } => {
                self.sink.emit(&DiagnosticEvent::Reconnect { amnesty });
            }
            Transition::CounterReset => self.sink.emit(&DiagnosticEvent::TripCounterReset),
            Transition::None => {}
        }

        let drift_warnings = if self.drift.is_due(now, self.state.drift_last_check_ms) {
            self.state.drift_last_check_ms = now;
            let warnings = self.drift.check(
                &mut self.sampler,
                &self.cfg.channels,
                &self.state.calibration,
                &noise,
            )?;
            for w in &warnings {
                self.sink.emit(&DiagnosticEvent::DriftWarning(*w));
            }
            warnings
        } else {
            Vec::new()
        };

        let load = self.protection.load_status(&self.state.protection, now);
        let trip_count = self.state.protection.trip_count;
        self.sink.emit(&DiagnosticEvent::Status {
            load,
            trip_count,
            last_trip: self.state.protection.last_trip_reason,
        });
        self.state.cycles += 1;

        Ok(CycleStatus::Running(CycleReport {
            currents,
            average,
            fault,
            transition,
            load,
            trip_count,
            drift_warnings,
        }))
    }

    /// One cycle followed by the blocking cycle delay.
    pub fn step(&mut self) -> Result<CycleStatus> {
        let status = self.cycle()?;
        self.clock.sleep_ms(self.cfg.control.cycle_ms);
        Ok(status)
    }

    /// Open the relay. Safe to call in any state.
    pub fn shutdown(&mut self) -> Result<()> {
        self.protection
            .disarm(&mut self.state.protection, &mut self.relay)
    }

    fn sample_currents(&mut self) -> Result<PhaseValues> {
        let mut out = [0.0; PHASE_COUNT];
        for ch in &self.cfg.channels {
            let i = ch.phase.index();
            out[i] = self
                .sampler
                .read_current(ch, &self.state.calibration[i])?;
        }
        Ok(out)
    }
}
