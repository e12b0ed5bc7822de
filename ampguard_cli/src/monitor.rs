//! Command implementations: build the controller from config and drive it.

use std::sync::atomic::AtomicBool;

use ampguard_config::Config;
use ampguard_core::calibration::missing_phases;
use ampguard_core::{
    CalibrationFailure, CalibrationState, Calibrator, ControllerCfg, DiagnosticEvent,
    DiagnosticSink, Monitor, PHASE_COUNT, Report, RunSummary, Sampler, SystemReadiness,
};
use ampguard_traits::MonotonicClock;
use eyre::{Result, WrapErr};

use crate::console::ConsoleSink;
use crate::plant::Io;

fn build(cfg: &Config, io: Io, json: bool) -> Result<Monitor> {
    let (adc, relay) = io;
    let core = ControllerCfg::from(cfg);
    Monitor::builder()
        .with_adc(adc)
        .with_relay(relay)
        .with_config(core)
        .with_sink(ConsoleSink::new(json))
        .build()
        .wrap_err("build controller")
}

/// `run`: calibrate, then protect until `shutdown` or the cycle budget.
pub fn run_monitor(
    cfg: &Config,
    io: Io,
    json: bool,
    shutdown: &AtomicBool,
    max_cycles: Option<u64>,
) -> Result<RunSummary> {
    let mut monitor = build(cfg, io, json)?;
    tracing::info!(
        variant = ?cfg.system.variant,
        cycle_ms = cfg.control.cycle_ms,
        drift = cfg.drift_enabled(),
        "monitor start"
    );
    ampguard_core::run(&mut monitor, shutdown, max_cycles)
}

/// `calibrate`: startup only; the relay is opened again before returning.
pub fn calibrate(cfg: &Config, io: Io, json: bool) -> Result<()> {
    let mut monitor = build(cfg, io, json)?;
    let started = monitor.startup().map(Clone::clone);
    let readiness = match started {
        Ok(r) => r,
        Err(e) => {
            let _ = monitor.shutdown();
            return Err(e);
        }
    };
    monitor.shutdown().wrap_err("open relay after calibration")?;

    if let SystemReadiness::Degraded(failure) = readiness {
        return Err(Report::new(failure));
    }
    let state = monitor.state();
    if !json {
        let zeros = state
            .calibration
            .iter()
            .map(|c| format!("{:.4} V", c.zero_voltage))
            .collect::<Vec<_>>()
            .join(" / ");
        println!("Calibration OK. Zero points L1/L2/L3: {zeros}");
        if let Some(noise) = &state.noise {
            println!(
                "Gate thresholds L1/L2/L3: {:.3} / {:.3} / {:.3} A",
                noise.thresholds[0], noise.thresholds[1], noise.thresholds[2]
            );
        }
    }
    Ok(())
}

/// `self-check`: presence test on every phase, no calibration and no relay.
pub fn self_check(cfg: &Config, io: Io, json: bool) -> Result<()> {
    let (adc, _relay) = io;
    let core = ControllerCfg::from(cfg);
    let clock = MonotonicClock::new();
    let mut sampler = Sampler::new(adc, core.adc);
    let calibrator = Calibrator::new(&core.calibration, &clock);
    let mut sink = ConsoleSink::new(json);

    let mut states =
        [CalibrationState::disconnected(core.calibration.default_zero_voltage); PHASE_COUNT];
    for ch in &core.channels {
        let (connected, stats) = calibrator
            .check_sensor_presence(&mut sampler, ch)
            .wrap_err_with(|| format!("presence check on {}", ch.phase))?;
        sink.emit(&DiagnosticEvent::SensorPresence {
            phase: ch.phase,
            connected,
            stats,
        });
        states[ch.phase.index()].connected = connected;
    }

    let missing = missing_phases(&states);
    if !missing.is_empty() {
        return Err(Report::new(CalibrationFailure::SensorMissing(missing)));
    }
    if !json {
        println!("Self-check OK: all sensors present");
    }
    Ok(())
}
