//! Console rendering of diagnostic events: text lines or JSON lines on stdout.

use ampguard_core::{
    DiagnosticEvent, DiagnosticSink, NoiseLevel, NoiseProfile, RunSummary, TracingSink,
};
use serde_json::{Value, json};

/// Prints every event on stdout and forwards it to `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleSink {
    json: bool,
    log: TracingSink,
}

impl ConsoleSink {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            log: TracingSink,
        }
    }
}

impl DiagnosticSink for ConsoleSink {
    fn emit(&mut self, event: &DiagnosticEvent) {
        if self.json {
            println!("{}", event_json(event));
        } else {
            println!("{event}");
        }
        self.log.emit(event);
    }
}

fn noise_json(p: &NoiseProfile) -> Value {
    match p.level {
        NoiseLevel::Global(n) => json!({
            "policy": "basic",
            "noise_a": n,
            "thresholds_a": p.thresholds,
        }),
        NoiseLevel::PerPhase(n) => json!({
            "policy": "advanced",
            "noise_a": n,
            "thresholds_a": p.thresholds,
        }),
    }
}

/// One JSON object per event; `event` carries the stable kind name.
pub fn event_json(event: &DiagnosticEvent) -> Value {
    let body = match event {
        DiagnosticEvent::CalibrationProgress { stage, percent } => {
            json!({ "stage": stage.label(), "percent": percent })
        }
        DiagnosticEvent::SensorPresence {
            phase,
            connected,
            stats,
        } => json!({
            "phase": phase.label(),
            "connected": connected,
            "min": stats.min,
            "max": stats.max,
            "mean": stats.mean,
        }),
        DiagnosticEvent::ZeroPoint {
            phase,
            stage,
            zero_voltage,
        } => json!({
            "phase": phase.label(),
            "stage": stage.label(),
            "zero_v": zero_voltage,
        }),
        DiagnosticEvent::NoiseProfile(p) => noise_json(p),
        DiagnosticEvent::CalibrationFailed(e) | DiagnosticEvent::Degraded(e) => {
            json!({ "reason": e.to_string() })
        }
        DiagnosticEvent::Ready | DiagnosticEvent::TripCounterReset => json!({}),
        DiagnosticEvent::Readings { currents, average } => {
            json!({ "currents_a": currents, "average_a": average })
        }
        DiagnosticEvent::Status {
            load,
            trip_count,
            last_trip,
        } => json!({
            "load": load.to_string(),
            "trip_count": trip_count,
            "last_trip": last_trip.to_string(),
        }),
        DiagnosticEvent::Trip { fault, trip_count } => {
            json!({ "fault": fault.to_string(), "trip_count": trip_count })
        }
        DiagnosticEvent::Reconnect { amnesty } => json!({ "amnesty": amnesty }),
        DiagnosticEvent::DriftWarning(w) => json!({
            "phase": w.phase.label(),
            "current_a": w.current_a,
            "threshold_a": w.threshold_a,
        }),
    };
    let mut obj = json!({ "event": event.kind() });
    if let (Some(dst), Value::Object(src)) = (obj.as_object_mut(), body) {
        dst.extend(src);
    }
    obj
}

pub fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "event": "summary",
                "cycles": summary.cycles,
                "trips": summary.trips,
                "reconnects": summary.reconnects,
                "drift_warnings": summary.drift_warnings,
                "trip_count": summary.trip_count,
                "final_load": summary.final_load.to_string(),
            })
        );
    } else {
        println!(
            "Stopped after {} cycles: trips {}, reconnects {}, drift warnings {}, load {}",
            summary.cycles,
            summary.trips,
            summary.reconnects,
            summary.drift_warnings,
            summary.final_load
        );
    }
}
