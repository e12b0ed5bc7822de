//! Test and helper sinks for ampguard_core

use std::sync::{Arc, Mutex};

use crate::events::{DiagnosticEvent, DiagnosticSink};

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _event: &DiagnosticEvent) {}
}

/// Records events into a shared buffer; clones observe the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Number of recorded events with the given `kind()`.
    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .map(|v| v.iter().filter(|e| e.kind() == kind).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.events.lock() {
            v.clear();
        }
    }
}

impl DiagnosticSink for RecordingSink {
    fn emit(&mut self, event: &DiagnosticEvent) {
        if let Ok(mut v) = self.events.lock() {
            v.push(event.clone());
        }
    }
}
