//! Per-cycle status returned from the control loop.

use std::fmt;

use crate::drift::DriftWarning;
use crate::error::CalibrationFailure;
use crate::fault::FaultKind;
use crate::phase::PhaseValues;
use crate::protection::Transition;

/// Relay-side view of the protection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Connected,
    Tripped,
    /// Tripped with the retry budget spent; waiting out the reset window.
    LockedOut,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadStatus::Connected => "ON",
            LoadStatus::Tripped => "OFF",
            LoadStatus::LockedOut => "LOCKOUT",
        })
    }
}

/// What one control cycle measured and decided.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Filtered and gated per-phase currents.
    pub currents: PhaseValues,
    pub average: f32,
    pub fault: FaultKind,
    pub transition: Transition,
    pub load: LoadStatus,
    pub trip_count: u16,
    pub drift_warnings: Vec<DriftWarning>,
}

/// Public status of a single step of the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleStatus {
    Running(CycleReport),
    /// Startup calibration failed; no measurement, relay held open.
    Degraded(CalibrationFailure),
}
