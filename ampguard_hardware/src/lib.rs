//! Backends for the `ampguard_traits` boundary.
//!
//! - [`SimulatedPlant`] hands out a [`SimulatedAdc`] and [`SimulatedRelay`] that share one
//!   model of three Hall sensors and a contactor. Load current only flows while the relay
//!   is energized.
//! - [`replay::ReplayAdc`] plays back a recorded raw trace.
//! - With the `hardware` feature: an MCP3208 SPI converter and a GPIO relay via `rppal`.
pub mod error;
pub mod replay;

#[cfg(feature = "hardware")]
pub mod mcp3208;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ampguard_traits::{AnalogInput, LoadSwitch};
use tracing::{debug, trace};

use crate::error::HwError;

pub use replay::ReplayAdc;

/// Extra current added to one channel once the relay has been closed for a while.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectedFault {
    pub channel: u8,
    pub amps: f32,
    /// Reads of `channel` with the relay closed before the fault appears.
    pub after_reads: u64,
}

#[derive(Debug, Clone, Copy)]
struct SensorSim {
    present: bool,
    counts_per_amp: f32,
    load_amps: f32,
    energized_reads: u64,
    flip: bool,
}

#[derive(Debug)]
struct PlantState {
    zero_code: u16,
    /// Slope for sensors registered without their own sensitivity.
    counts_per_amp: f32,
    volts_per_count: f32,
    max_code: u16,
    jitter: u16,
    sensors: BTreeMap<u8, SensorSim>,
    relay_closed: bool,
    relay_writes: u64,
    fault: Option<InjectedFault>,
    fail_after: Option<u64>,
    total_reads: u64,
}

/// Shared model behind the simulated ADC and relay.
///
/// Unregistered channels read 0, like an open input pulled to ground.
#[derive(Debug, Clone)]
pub struct SimulatedPlant {
    state: Rc<RefCell<PlantState>>,
}

impl SimulatedPlant {
    /// `zero_code` is the idle output of every sensor; `counts_per_amp` its slope.
    pub fn new(zero_code: u16, counts_per_amp: f32) -> Self {
        Self {
            state: Rc::new(RefCell::new(PlantState {
                zero_code,
                counts_per_amp,
                volts_per_count: 3.3 / 4096.0,
                max_code: 4095,
                jitter: 3,
                sensors: BTreeMap::new(),
                relay_closed: false,
                relay_writes: 0,
                fault: None,
                fail_after: None,
                total_reads: 0,
            })),
        }
    }

    /// Derives the idle code and slope from converter and sensor parameters.
    pub fn for_sensors(vref: f32, resolution: u32, zero_voltage: f32, v_per_a: f32) -> Self {
        let volts_per_count = vref / resolution as f32;
        let zero_code = (zero_voltage / volts_per_count).round() as u16;
        let plant = Self::new(zero_code, v_per_a / volts_per_count);
        {
            let mut st = plant.state.borrow_mut();
            st.volts_per_count = volts_per_count;
            st.max_code = u16::try_from(resolution.saturating_sub(1)).unwrap_or(u16::MAX);
        }
        plant
    }

    /// Sensor on `channel` with the plant-wide slope.
    pub fn with_sensor(self, channel: u8) -> Self {
        let cpa = self.state.borrow().counts_per_amp;
        self.insert_sensor(channel, cpa)
    }

    /// Sensor on `channel` with its own output slope in volts per ampere.
    pub fn with_sensor_sensitivity(self, channel: u8, v_per_a: f32) -> Self {
        let cpa = v_per_a / self.state.borrow().volts_per_count;
        self.insert_sensor(channel, cpa)
    }

    fn insert_sensor(self, channel: u8, counts_per_amp: f32) -> Self {
        self.state.borrow_mut().sensors.insert(
            channel,
            SensorSim {
                present: true,
                counts_per_amp,
                load_amps: 0.0,
                energized_reads: 0,
                flip: false,
            },
        );
        self
    }

    /// Peak deviation of the alternating read noise, in counts.
    pub fn with_jitter(self, counts: u16) -> Self {
        self.state.borrow_mut().jitter = counts;
        self
    }

    pub fn with_fault(self, fault: InjectedFault) -> Self {
        self.state.borrow_mut().fault = Some(fault);
        self
    }

    /// Every read after the first `reads` fails with a bus error.
    pub fn with_adc_failure_after(self, reads: u64) -> Self {
        self.state.borrow_mut().fail_after = Some(reads);
        self
    }

    /// Steady load current drawn through `channel` while the relay is closed.
    pub fn set_load(&self, channel: u8, amps: f32) {
        if let Some(s) = self.state.borrow_mut().sensors.get_mut(&channel) {
            s.load_amps = amps;
        }
    }

    /// Unplug (or replug) the sensor on `channel`.
    pub fn set_present(&self, channel: u8, present: bool) {
        if let Some(s) = self.state.borrow_mut().sensors.get_mut(&channel) {
            s.present = present;
        }
    }

    pub fn relay_closed(&self) -> bool {
        self.state.borrow().relay_closed
    }

    pub fn relay_writes(&self) -> u64 {
        self.state.borrow().relay_writes
    }

    pub fn zero_code(&self) -> u16 {
        self.state.borrow().zero_code
    }

    pub fn adc(&self) -> SimulatedAdc {
        SimulatedAdc {
            plant: self.clone(),
        }
    }

    pub fn relay(&self) -> SimulatedRelay {
        SimulatedRelay {
            plant: self.clone(),
        }
    }

    fn sample(&self, channel: u8) -> Result<u16, HwError> {
        let mut st = self.state.borrow_mut();
        st.total_reads += 1;
        if st.fail_after.is_some_and(|n| st.total_reads > n) {
            return Err(HwError::Spi("simulated bus fault".into()));
        }
        let (zero, max, jitter, closed, fault) = (
            st.zero_code,
            st.max_code,
            st.jitter,
            st.relay_closed,
            st.fault,
        );
        let Some(sensor) = st.sensors.get_mut(&channel) else {
            return Ok(0);
        };
        if !sensor.present {
            return Ok(0);
        }

        let mut amps = 0.0;
        if closed {
            sensor.energized_reads += 1;
            amps = sensor.load_amps;
            if let Some(f) = fault.filter(|f| f.channel == channel) {
                if sensor.energized_reads > f.after_reads {
                    amps += f.amps;
                }
            }
        }
        sensor.flip = !sensor.flip;
        let noise = if sensor.flip {
            f32::from(jitter)
        } else {
            -f32::from(jitter)
        };
        let code = f32::from(zero) + amps * sensor.counts_per_amp + noise;
        let code = code.round().clamp(0.0, f32::from(max)) as u16;
        trace!(channel, code, amps, "simulated conversion");
        Ok(code)
    }
}

/// ADC view of a [`SimulatedPlant`].
#[derive(Debug)]
pub struct SimulatedAdc {
    plant: SimulatedPlant,
}

impl AnalogInput for SimulatedAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.plant.sample(channel)?)
    }
}

/// Relay view of a [`SimulatedPlant`].
#[derive(Debug)]
pub struct SimulatedRelay {
    plant: SimulatedPlant,
}

impl LoadSwitch for SimulatedRelay {
    fn set_load(
        &mut self,
        connected: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = self.plant.state.borrow_mut();
        if st.relay_closed != connected {
            debug!(connected, "simulated relay switched");
        }
        st.relay_closed = connected;
        st.relay_writes += 1;
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub mod hardware {
    use ampguard_traits::LoadSwitch;
    use rppal::gpio::{Gpio, OutputPin};

    use crate::error::HwError;
    pub use crate::mcp3208::Mcp3208;

    /// Contactor coil (or optocoupler) driven from one GPIO line.
    pub struct GpioRelay {
        pin: OutputPin,
        active_low: bool,
    }

    impl GpioRelay {
        /// Claims `pin` and drives it to the open (load disconnected) level.
        pub fn try_new(pin: u8, active_low: bool) -> Result<Self, HwError> {
            let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
            let pin = gpio
                .get(pin)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output();
            let mut relay = Self { pin, active_low };
            relay.drive(false);
            Ok(relay)
        }

        fn drive(&mut self, connected: bool) {
            if connected != self.active_low {
                self.pin.set_high();
            } else {
                self.pin.set_low();
            }
        }
    }

    impl LoadSwitch for GpioRelay {
        fn set_load(
            &mut self,
            connected: bool,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.drive(connected);
            tracing::debug!(connected, "relay output set");
            Ok(())
        }
    }
}
