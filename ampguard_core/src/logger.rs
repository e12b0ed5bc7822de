//! Diagnostic sink that forwards events to `tracing`.

use crate::events::{DiagnosticEvent, DiagnosticSink};

/// Routes each event to a `tracing` level matching its severity.
///
/// Progress and per-cycle readings go to `debug` so a default `info` filter
/// only shows state changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, event: &DiagnosticEvent) {
        let kind = event.kind();
        match event {
            DiagnosticEvent::CalibrationProgress { .. }
            | DiagnosticEvent::Readings { .. }
            | DiagnosticEvent::Status { .. } => {
                tracing::debug!(target: "ampguard::diag", kind, "{event}");
            }
            DiagnosticEvent::Trip { .. } | DiagnosticEvent::DriftWarning(_) => {
                tracing::warn!(target: "ampguard::diag", kind, "{event}");
            }
            DiagnosticEvent::CalibrationFailed(_) | DiagnosticEvent::Degraded(_) => {
                tracing::error!(target: "ampguard::diag", kind, "{event}");
            }
            _ => tracing::info!(target: "ampguard::diag", kind, "{event}"),
        }
    }
}
