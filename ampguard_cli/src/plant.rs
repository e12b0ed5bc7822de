//! Backend assembly: simulated plant, trace replay or real hardware.

use ampguard_config::Config;
use ampguard_hardware::{InjectedFault, ReplayAdc, SimulatedPlant};
use ampguard_traits::{AnalogInput, LoadSwitch};
use eyre::{Result, WrapErr};

use crate::cli::{FaultArgs, SourceArgs};

/// Test hook: fail every ADC read after this many, as a bus fault would.
const SIM_FAIL_ENV: &str = "AMPGUARD_TEST_SIM_FAIL_AFTER";

pub type Io = (Box<dyn AnalogInput>, Box<dyn LoadSwitch>);

/// Picks the sample source for this run.
///
/// `--replay` wins over everything; otherwise real hardware when built with the
/// `hardware` feature, else the simulator.
pub fn make_io(cfg: &Config, source: &SourceArgs, fault: &FaultArgs) -> Result<Io> {
    if let Some(path) = &source.replay {
        return replay_io(cfg, path);
    }

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        let _ = fault;
        hardware_io(cfg)
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        let plant = simulated_plant(cfg, source, fault);
        tracing::info!(
            zero_code = plant.zero_code(),
            load_a = source.sim_load,
            "using simulated plant"
        );
        Ok((Box::new(plant.adc()), Box::new(plant.relay())))
    }
}

fn replay_io(cfg: &Config, path: &std::path::Path) -> Result<Io> {
    let rows = ampguard_config::load_raw_trace_csv(path)?;
    let rows: Vec<[u16; 3]> = rows.iter().map(|r| r.as_array()).collect();
    let pins = cfg.phases.as_array().map(|p| p.pin);
    let adc = ReplayAdc::new(rows, pins).wrap_err("load replay trace")?;
    tracing::info!(rows = adc.len(), path = %path.display(), "replaying raw trace");
    // a replayed run has no contactor; the simulated one records the decisions
    let relay = SimulatedPlant::new(0, 0.0).relay();
    Ok((Box::new(adc), Box::new(relay)))
}

/// Simulated sensors on the configured pins, with the requested load and faults.
#[cfg_attr(all(feature = "hardware", target_os = "linux"), allow(dead_code))]
pub fn simulated_plant(cfg: &Config, source: &SourceArgs, fault: &FaultArgs) -> SimulatedPlant {
    let phases = cfg.phases.as_array();
    let mut plant = SimulatedPlant::for_sensors(
        cfg.adc.vref,
        cfg.adc.resolution,
        cfg.calibration.default_zero_voltage,
        phases[0].sensitivity(),
    )
    .with_jitter(source.sim_jitter);
    for p in &phases {
        plant = plant.with_sensor_sensitivity(p.pin, p.sensitivity());
    }
    if let Some(phase) = fault.inject_fault {
        plant = plant.with_fault(InjectedFault {
            channel: phases[phase.index()].pin,
            amps: fault.fault_amps,
            after_reads: fault.fault_after,
        });
    }
    if let Some(n) = std::env::var(SIM_FAIL_ENV)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        plant = plant.with_adc_failure_after(n);
    }
    for p in &phases {
        plant.set_load(p.pin, source.sim_load);
    }
    if let Some(phase) = source.sim_missing {
        plant.set_present(phases[phase.index()].pin, false);
    }
    plant
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn hardware_io(cfg: &Config) -> Result<Io> {
    use ampguard_hardware::hardware::{GpioRelay, Mcp3208};

    const SPI_CLOCK_HZ: u32 = 1_000_000;

    let relay = GpioRelay::try_new(cfg.relay.pin, cfg.relay.active_low)
        .wrap_err_with(|| format!("open relay pin {}", cfg.relay.pin))?;
    let adc = Mcp3208::try_new(SPI_CLOCK_HZ).wrap_err("open mcp3208 on spi0")?;
    tracing::info!(
        relay_pin = cfg.relay.pin,
        active_low = cfg.relay.active_low,
        "using hardware backend"
    );
    Ok((Box::new(adc), Box::new(relay)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ampguard_core::Phase;

    const CFG: &str = r#"
[phases]
l1 = { pin = 0, rated_amps = 20 }
l2 = { pin = 1, rated_amps = 20 }
l3 = { pin = 2, rated_amps = 20 }
"#;

    #[test]
    fn missing_phase_reads_ground() {
        let cfg = ampguard_config::load_toml(CFG).unwrap();
        let source = SourceArgs {
            sim_missing: Some(Phase::L3),
            sim_jitter: 3,
            ..Default::default()
        };
        let plant = simulated_plant(&cfg, &source, &FaultArgs::default());
        let mut adc = plant.adc();
        assert_eq!(adc.read_raw(2).unwrap(), 0);
        assert!(adc.read_raw(0).unwrap() > 3000);
    }

    #[test]
    fn mixed_ratings_read_back_the_same_load() {
        let cfg = ampguard_config::load_toml(
            r#"
[phases]
l1 = { pin = 0, rated_amps = 20 }
l2 = { pin = 1, rated_amps = 20 }
l3 = { pin = 2, rated_amps = 30 }
"#,
        )
        .unwrap();
        let source = SourceArgs {
            sim_load: 5.0,
            ..Default::default()
        };
        let plant = simulated_plant(&cfg, &source, &FaultArgs::default());
        plant.relay().set_load(true).unwrap();
        let mut adc = plant.adc();
        let zero = f32::from(plant.zero_code());
        let volts_per_count = cfg.adc.vref / cfg.adc.resolution as f32;
        for (ch, p) in cfg.phases.as_array().iter().enumerate() {
            let code = f32::from(adc.read_raw(ch as u8).unwrap());
            let amps = (code - zero) * volts_per_count / p.sensitivity();
            assert!((amps - 5.0).abs() < 0.05, "phase {ch} reads {amps} A");
        }
    }

    #[test]
    fn fault_targets_configured_pin() {
        let cfg = ampguard_config::load_toml(CFG).unwrap();
        let fault = FaultArgs {
            inject_fault: Some(Phase::L2),
            fault_amps: 5.0,
            fault_after: 0,
        };
        let source = SourceArgs::default();
        let plant = simulated_plant(&cfg, &source, &fault);
        let mut relay = plant.relay();
        relay.set_load(true).unwrap();
        let mut adc = plant.adc();
        let zero = plant.zero_code();
        assert_eq!(adc.read_raw(0).unwrap(), zero);
        assert!(adc.read_raw(1).unwrap() > zero + 600);
    }
}
