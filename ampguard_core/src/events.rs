//! Diagnostic events and the sink they are reported to.
//!
//! The core never formats for a display or serial port; it emits these events
//! and the host decides how (or whether) to render them.

use std::fmt;

use crate::calibration::PresenceStats;
use crate::drift::DriftWarning;
use crate::error::CalibrationFailure;
use crate::fault::FaultKind;
use crate::noise::{NoiseLevel, NoiseProfile};
use crate::phase::{Phase, PhaseValues};
use crate::status::LoadStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationStage {
    /// Single-stage zero pass.
    Zero,
    Coarse,
    Fine,
    Noise,
}

impl CalibrationStage {
    pub fn label(self) -> &'static str {
        match self {
            CalibrationStage::Zero => "zero",
            CalibrationStage::Coarse => "coarse",
            CalibrationStage::Fine => "fine",
            CalibrationStage::Noise => "noise",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    CalibrationProgress {
        stage: CalibrationStage,
        percent: u8,
    },
    SensorPresence {
        phase: Phase,
        connected: bool,
        stats: PresenceStats,
    },
    ZeroPoint {
        phase: Phase,
        stage: CalibrationStage,
        zero_voltage: f32,
    },
    NoiseProfile(NoiseProfile),
    CalibrationFailed(CalibrationFailure),
    /// Calibration passed and the load was connected.
    Ready,
    Readings {
        currents: PhaseValues,
        average: f32,
    },
    Status {
        load: LoadStatus,
        trip_count: u16,
        last_trip: FaultKind,
    },
    Trip {
        fault: FaultKind,
        trip_count: u16,
    },
    Reconnect {
        amnesty: bool,
    },
    TripCounterReset,
    DriftWarning(DriftWarning),
    /// Periodic reminder that the boot is degraded.
    Degraded(CalibrationFailure),
}

impl DiagnosticEvent {
    /// Stable machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            DiagnosticEvent::CalibrationProgress { .. } => "calibration_progress",
            DiagnosticEvent::SensorPresence { .. } => "sensor_presence",
            DiagnosticEvent::ZeroPoint { .. } => "zero_point",
            DiagnosticEvent::NoiseProfile(_) => "noise_profile",
            DiagnosticEvent::CalibrationFailed(_) => "calibration_failed",
            DiagnosticEvent::Ready => "ready",
            DiagnosticEvent::Readings { .. } => "readings",
            DiagnosticEvent::Status { .. } => "status",
            DiagnosticEvent::Trip { .. } => "trip",
            DiagnosticEvent::Reconnect { .. } => "reconnect",
            DiagnosticEvent::TripCounterReset => "trip_counter_reset",
            DiagnosticEvent::DriftWarning(_) => "drift_warning",
            DiagnosticEvent::Degraded(_) => "degraded",
        }
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::CalibrationProgress { stage, percent } => {
                write!(f, "Calibrating ({}): {percent}%", stage.label())
            }
            DiagnosticEvent::SensorPresence {
                phase,
                connected,
                stats,
            } => write!(
                f,
                "{phase} sensor {} (min={} max={} mean={:.1})",
                if *connected { "OK" } else { "MISSING" },
                stats.min,
                stats.max,
                stats.mean
            ),
            DiagnosticEvent::ZeroPoint {
                phase,
                stage,
                zero_voltage,
            } => write!(f, "{phase} zero ({}): {zero_voltage:.4} V", stage.label()),
            DiagnosticEvent::NoiseProfile(p) => match p.level {
                NoiseLevel::Global(n) => write!(
                    f,
                    "Noise: {n:.3} A, threshold {:.3} A",
                    p.thresholds[0]
                ),
                NoiseLevel::PerPhase(n) => write!(
                    f,
                    "Noise: L1 {:.3} L2 {:.3} L3 {:.3} A, thresholds {:.3}/{:.3}/{:.3} A",
                    n[0], n[1], n[2], p.thresholds[0], p.thresholds[1], p.thresholds[2]
                ),
            },
            DiagnosticEvent::CalibrationFailed(e) => write!(f, "CALIBRATION FAILED: {e}"),
            DiagnosticEvent::Ready => f.write_str("System ready, load connected"),
            DiagnosticEvent::Readings { currents, average } => write!(
                f,
                "L1: {:.2}A  L2: {:.2}A  L3: {:.2}A  Avg: {average:.2}A",
                currents[0], currents[1], currents[2]
            ),
            DiagnosticEvent::Status {
                load,
                trip_count,
                last_trip,
            } => match load {
                LoadStatus::Connected => write!(f, "Load: {load}  Trips: {trip_count}"),
                _ => write!(f, "Load: {load}  Trips: {trip_count}  Last: {last_trip}"),
            },
            DiagnosticEvent::Trip { fault, trip_count } => {
                write!(f, "TRIP: {fault} (count {trip_count})")
            }
            DiagnosticEvent::Reconnect { amnesty } => {
                if *amnesty {
                    f.write_str("Load reconnected, trip counter cleared")
                } else {
                    f.write_str("Load reconnected")
                }
            }
            DiagnosticEvent::TripCounterReset => f.write_str("Trip counter reset"),
            DiagnosticEvent::DriftWarning(w) => write!(
                f,
                "DRIFT {}: {:.3} A > {:.3} A",
                w.phase, w.current_a, w.threshold_a
            ),
            DiagnosticEvent::Degraded(e) => write!(f, "DEGRADED: {e}; load held off"),
        }
    }
}

/// Consumer of diagnostic events.
pub trait DiagnosticSink {
    fn emit(&mut self, event: &DiagnosticEvent);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Box<T> {
    fn emit(&mut self, event: &DiagnosticEvent) {
        (**self).emit(event);
    }
}
