//! Raw ADC access and count/voltage/current conversion.
//!
//! `Sampler` owns the `AnalogInput` and is the only place that turns raw codes
//! into physical units. Trait-boundary errors are mapped to `MonitorError` here.
use ampguard_traits::AnalogInput;
use eyre::WrapErr;

use crate::calibration::CalibrationState;
use crate::config::AdcCfg;
use crate::hw_error::map_hw_error;
use crate::phase::PhaseChannel;

pub struct Sampler<A> {
    adc: A,
    cfg: AdcCfg,
    volts_per_count: f32,
    max_code: u16,
}

impl<A: AnalogInput> Sampler<A> {
    pub fn new(adc: A, cfg: AdcCfg) -> Self {
        Self {
            adc,
            volts_per_count: cfg.volts_per_count(),
            max_code: cfg.max_code(),
            cfg,
        }
    }

    pub fn adc_cfg(&self) -> &AdcCfg {
        &self.cfg
    }

    /// One conversion from `channel`, clamped to the configured code range.
    pub fn read_raw(&mut self, channel: u8) -> crate::Result<u16> {
        let raw = self
            .adc
            .read_raw(channel)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("adc read on channel {channel}"))?;
        Ok(raw.min(self.max_code))
    }

    pub fn read_voltage(&mut self, channel: u8) -> crate::Result<f32> {
        let raw = self.read_raw(channel)?;
        Ok(self.counts_to_volts(f32::from(raw)))
    }

    /// Convert a (possibly averaged) raw code to volts.
    #[inline]
    pub fn counts_to_volts(&self, counts: f32) -> f32 {
        counts * self.volts_per_count
    }

    /// Instantaneous current magnitude in amperes.
    ///
    /// A disconnected sensor reads as 0 A without touching the ADC.
    pub fn read_current(
        &mut self,
        channel: &PhaseChannel,
        cal: &CalibrationState,
    ) -> crate::Result<f32> {
        if !cal.connected {
            return Ok(0.0);
        }
        let v = self.read_voltage(channel.sensor_pin_id)?;
        Ok(current_from_voltage(
            v,
            cal.zero_voltage,
            channel.sensitivity_v_per_a,
        ))
    }
}

/// `|v - zero| / sensitivity`, or 0 when the sensitivity is unusable.
#[inline]
pub fn current_from_voltage(v: f32, zero_voltage: f32, sensitivity_v_per_a: f32) -> f32 {
    if !(sensitivity_v_per_a.is_finite() && sensitivity_v_per_a > 0.0) {
        return 0.0;
    }
    (v - zero_voltage).abs() / sensitivity_v_per_a
}
