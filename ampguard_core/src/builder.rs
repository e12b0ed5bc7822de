//! Type-state builder for `Monitor` and generic `build_controller` constructor.
//!
//! The builder enforces at compile time that the ADC and relay are provided
//! before `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use ampguard_traits::clock::{Clock, MonotonicClock};
use ampguard_traits::{AnalogInput, LoadSwitch};

use crate::config::{CalibrationMode, ControllerCfg, NoisePolicy, StagePass};
use crate::controller::Controller;
use crate::error::{BuildError, Result};
use crate::events::DiagnosticSink;
use crate::logger::TracingSink;

/// Boxed, dynamically dispatched controller used by the CLI.
pub type Monitor = Controller<Box<dyn AnalogInput>, Box<dyn LoadSwitch>>;

impl Monitor {
    /// Start building a Monitor.
    pub fn builder() -> MonitorBuilder<Missing, Missing> {
        MonitorBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Monitor`. Configuration is validated on `build()`.
pub struct MonitorBuilder<A, R> {
    adc: Option<Box<dyn AnalogInput>>,
    relay: Option<Box<dyn LoadSwitch>>,
    cfg: Option<ControllerCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn DiagnosticSink>>,
    _a: PhantomData<A>,
    _r: PhantomData<R>,
}

impl Default for MonitorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            adc: None,
            relay: None,
            cfg: None,
            clock: None,
            sink: None,
            _a: PhantomData,
            _r: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn validate_pass(p: &StagePass) -> Result<()> {
    if p.samples == 0 {
        return Err(invalid("calibration pass needs at least one sample"));
    }
    Ok(())
}

/// Validate a runtime configuration.
///
/// This is the single source of truth for construction-time checks, used by
/// both `MonitorBuilder::try_build()` and `build_controller()`.
pub fn validate(cfg: &ControllerCfg) -> Result<()> {
    if !(cfg.adc.vref.is_finite() && cfg.adc.vref > 0.0) {
        return Err(invalid("vref must be > 0"));
    }
    if !(256..=65_536).contains(&cfg.adc.resolution) {
        return Err(invalid("adc resolution out of range"));
    }
    for ch in &cfg.channels {
        if !(ch.sensitivity_v_per_a.is_finite() && ch.sensitivity_v_per_a > 0.0) {
            return Err(invalid("sensor sensitivity must be > 0"));
        }
    }
    for (i, a) in cfg.channels.iter().enumerate() {
        if a.phase.index() != i {
            return Err(invalid("channels must be in L1, L2, L3 order"));
        }
        if cfg.channels[i + 1..]
            .iter()
            .any(|b| b.sensor_pin_id == a.sensor_pin_id)
        {
            return Err(invalid("phases must use distinct ADC channels"));
        }
    }
    if cfg.calibration.presence_samples == 0 {
        return Err(invalid("presence check needs at least one sample"));
    }
    match &cfg.calibration.mode {
        CalibrationMode::SingleStage(p) => validate_pass(p)?,
        CalibrationMode::TwoStage { coarse, fine } => {
            validate_pass(coarse)?;
            validate_pass(fine)?;
        }
    }
    if cfg.noise.samples == 0 {
        return Err(invalid("noise analysis needs at least one sample"));
    }
    let margin = match cfg.noise.policy {
        NoisePolicy::Basic { margin_factor, .. } | NoisePolicy::Advanced { margin_factor } => {
            margin_factor
        }
    };
    if !(margin.is_finite() && margin >= 1.0) {
        return Err(invalid("noise margin factor must be >= 1"));
    }
    let p = &cfg.protection;
    if !(p.overcurrent_trip_a.is_finite() && p.overcurrent_trip_a > 0.0) {
        return Err(invalid("overcurrent trip must be > 0"));
    }
    if p.imbalance_limit_a.is_sign_negative() || p.min_current_for_imbalance_a.is_sign_negative()
    {
        return Err(invalid("imbalance limits must be >= 0"));
    }
    if p.restart_threshold_a.is_sign_negative() {
        return Err(invalid("restart threshold must be >= 0"));
    }
    if p.max_trip_count == 0 {
        return Err(invalid("max_trip_count must be >= 1"));
    }
    if p.trip_reset_ms <= p.lockout_ms {
        return Err(invalid("trip reset time must exceed lockout time"));
    }
    if cfg.control.cycle_ms == 0 {
        return Err(invalid("cycle_ms must be >= 1"));
    }
    if cfg.drift.enabled && cfg.drift.interval_ms == 0 {
        return Err(invalid("drift interval must be >= 1"));
    }
    Ok(())
}

impl<A, R> MonitorBuilder<A, R> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Monitor> {
        let adc = self
            .adc
            .ok_or_else(|| eyre::Report::new(BuildError::MissingAdc))?;
        let relay = self
            .relay
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRelay))?;
        build_controller(adc, relay, self.cfg.unwrap_or_default(), self.clock, self.sink)
    }
}

/// Chainable setters that do not affect type-state.
impl<A, R> MonitorBuilder<A, R> {
    pub fn with_config(mut self, cfg: ControllerCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Diagnostic sink; defaults to `TracingSink`.
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }
}

// Setters that advance type-state
impl<R> MonitorBuilder<Missing, R> {
    pub fn with_adc(self, adc: impl AnalogInput + 'static) -> MonitorBuilder<Set, R> {
        MonitorBuilder {
            adc: Some(Box::new(adc)),
            relay: self.relay,
            cfg: self.cfg,
            clock: self.clock,
            sink: self.sink,
            _a: PhantomData,
            _r: PhantomData,
        }
    }
}

impl<A> MonitorBuilder<A, Missing> {
    pub fn with_relay(self, relay: impl LoadSwitch + 'static) -> MonitorBuilder<A, Set> {
        MonitorBuilder {
            adc: self.adc,
            relay: Some(Box::new(relay)),
            cfg: self.cfg,
            clock: self.clock,
            sink: self.sink,
            _a: PhantomData,
            _r: PhantomData,
        }
    }
}

impl MonitorBuilder<Set, Set> {
    /// Validate and build the Monitor. Only available when ADC and relay are set.
    pub fn build(self) -> Result<Monitor> {
        self.try_build()
    }
}

/// Build a generic, statically-dispatched controller from concrete I/O.
pub fn build_controller<A, R>(
    adc: A,
    relay: R,
    cfg: ControllerCfg,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    sink: Option<Box<dyn DiagnosticSink>>,
) -> Result<Controller<A, R>>
where
    A: AnalogInput,
    R: LoadSwitch,
{
    validate(&cfg)?;
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    let sink = sink.unwrap_or_else(|| Box::new(TracingSink));
    Ok(Controller::new(adc, relay, cfg, clock, sink))
}
