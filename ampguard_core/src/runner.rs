use std::sync::atomic::{AtomicBool, Ordering};

use ampguard_traits::{AnalogInput, LoadSwitch};

use crate::controller::{Controller, SystemReadiness};
use crate::error::{Report, Result as CoreResult};
use crate::protection::Transition;
use crate::status::{CycleStatus, LoadStatus};

/// Totals collected over one run of the control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub trips: u64,
    pub reconnects: u64,
    pub drift_warnings: u64,
    pub trip_count: u16,
    /// Load state observed before the relay was opened on exit.
    pub final_load: LoadStatus,
}

/// Whether the loop should stop before the next cycle.
#[inline]
fn should_stop(shutdown: &AtomicBool, cycles: u64, max_cycles: Option<u64>) -> bool {
    shutdown.load(Ordering::Relaxed) || max_cycles.is_some_and(|m| cycles >= m)
}

/// Best-effort relay open on the way out.
fn open_relay<A: AnalogInput, R: LoadSwitch>(controller: &mut Controller<A, R>) {
    if let Err(e) = controller.shutdown() {
        tracing::warn!(error = %e, "relay open failed on exit");
    }
}

/// Calibrate, then run the control loop until `shutdown` is raised or
/// `max_cycles` cycles have run.
///
/// A degraded boot keeps idling (relay open, periodic diagnostics) and is
/// returned as the `CalibrationFailure` once the loop stops. I/O errors open
/// the relay before propagating.
pub fn run<A: AnalogInput, R: LoadSwitch>(
    controller: &mut Controller<A, R>,
    shutdown: &AtomicBool,
    max_cycles: Option<u64>,
) -> CoreResult<RunSummary> {
    if let Err(e) = controller.startup() {
        open_relay(controller);
        return Err(e);
    }
    tracing::info!(
        ready = controller.readiness().calibration_ok(),
        drift = controller.drift.enabled(),
        max_cycles,
        "control loop start"
    );

    let mut summary = RunSummary {
        cycles: 0,
        trips: 0,
        reconnects: 0,
        drift_warnings: 0,
        trip_count: 0,
        final_load: controller.load_status(),
    };

    while !should_stop(shutdown, summary.cycles, max_cycles) {
        match controller.step() {
            Ok(CycleStatus::Running(report)) => {
                match report.transition {
                    Transition::Tripped(_) => summary.trips += 1,
                    Transition::Reconnected { .. } => summary.reconnects += 1,
                    Transition::CounterReset | Transition::None => {}
                }
                summary.drift_warnings += report.drift_warnings.len() as u64;
                summary.trip_count = report.trip_count;
            }
            Ok(CycleStatus::Degraded(_)) => {}
            Err(e) => {
                open_relay(controller);
                tracing::error!(error = %e, cycles = summary.cycles, "control loop aborted");
                return Err(e);
            }
        }
        summary.cycles += 1;
    }

    summary.final_load = controller.load_status();
    open_relay(controller);
    tracing::info!(
        cycles = summary.cycles,
        trips = summary.trips,
        reconnects = summary.reconnects,
        "control loop stopped"
    );

    if let SystemReadiness::Degraded(failure) = controller.readiness() {
        return Err(Report::new(failure.clone()));
    }
    Ok(summary)
}
