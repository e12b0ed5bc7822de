#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Three-phase current monitoring and protection logic (hardware-agnostic).
//!
//! All hardware interactions go through `ampguard_traits::AnalogInput` and
//! `ampguard_traits::LoadSwitch`; all waits go through `ampguard_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Sampling**: raw code → volts → zero-referenced amps (`sampler`)
//! - **Calibration**: sensor presence and zero voltage per phase (`calibration`)
//! - **Noise**: zero-load baseline and gating thresholds (`noise`)
//! - **Filtering**: 10-deep moving average with noise gate (`filter`)
//! - **Detection**: overcurrent and phase imbalance (`fault`)
//! - **Protection**: trip, lockout and bounded auto-restart (`protection`)
//! - **Drift**: periodic zero-drift warnings (`drift`)
//! - **Control loop**: `Controller`, built with `MonitorBuilder` or `build_controller`
//!
//! Calibration failures (missing sensor, excessive noise) are terminal for a
//! controller instance: it stays degraded with the relay open.

pub mod builder;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod drift;
pub mod error;
pub mod events;
pub mod fault;
pub mod filter;
pub mod hw_error;
pub mod logger;
pub mod mocks;
pub mod noise;
pub mod phase;
pub mod protection;
pub mod runner;
pub mod sampler;
pub mod status;
pub mod util;

pub use builder::{Missing, Monitor, MonitorBuilder, Set, build_controller};
pub use calibration::{CalibrationOutcome, CalibrationState, Calibrator, PresenceStats};
pub use config::{
    AdcCfg, CalibrationCfg, CalibrationMode, ControlCfg, ControllerCfg, DriftCfg, NoiseCfg,
    NoisePolicy, ProtectionCfg, StagePass,
};
pub use controller::{Controller, ControllerState, SystemReadiness};
pub use drift::{DriftMonitor, DriftWarning};
pub use error::{BuildError, CalibrationFailure, MonitorError, Report, Result};
pub use events::{CalibrationStage, DiagnosticEvent, DiagnosticSink};
pub use fault::{FaultDetector, FaultKind};
pub use filter::{CurrentFilter, FILTER_DEPTH, RingBuffer, average_current};
pub use logger::TracingSink;
pub use noise::{NoiseAnalyzer, NoiseLevel, NoiseProfile};
pub use phase::{PHASE_COUNT, Phase, PhaseChannel, PhaseValues};
pub use protection::{ProtectionState, ProtectionStateMachine, TRIP_COUNT_CAP, Transition};
pub use runner::{RunSummary, run};
pub use sampler::Sampler;
pub use status::{CycleReport, CycleStatus, LoadStatus};
