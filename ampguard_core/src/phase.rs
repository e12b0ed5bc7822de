//! Phase identifiers and per-phase sensor wiring.

use std::fmt;
use std::str::FromStr;

pub const PHASE_COUNT: usize = 3;

/// Per-phase values in L1, L2, L3 order.
pub type PhaseValues = [f32; PHASE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    L1,
    L2,
    L3,
}

impl Phase {
    /// Scan order used everywhere a "first match wins" rule applies.
    pub const ALL: [Phase; PHASE_COUNT] = [Phase::L1, Phase::L2, Phase::L3];

    /// Zero-based index (L1 = 0).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Phase::L1 => 0,
            Phase::L2 => 1,
            Phase::L3 => 2,
        }
    }

    pub const fn from_index(i: usize) -> Option<Phase> {
        match i {
            0 => Some(Phase::L1),
            1 => Some(Phase::L2),
            2 => Some(Phase::L3),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Phase::L1 => "L1",
            Phase::L2 => "L2",
            Phase::L3 => "L3",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Phase {
    type Err = String;

    /// Accepts `L2`, `l2` or the one-based number `2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let digits = t.strip_prefix(['L', 'l']).unwrap_or(t);
        match digits {
            "1" => Ok(Phase::L1),
            "2" => Ok(Phase::L2),
            "3" => Ok(Phase::L3),
            _ => Err(format!("unknown phase `{s}` (expected L1, L2 or L3)")),
        }
    }
}

/// One current sensor. Immutable after configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseChannel {
    pub phase: Phase,
    /// ADC channel the sensor output is wired to.
    pub sensor_pin_id: u8,
    /// Sensor output slope in volts per ampere.
    pub sensitivity_v_per_a: f32,
    pub rated_amps: u32,
}

impl PhaseChannel {
    /// Channel with the datasheet sensitivity for a 20 A or 30 A sensor.
    pub fn rated(phase: Phase, sensor_pin_id: u8, rated_amps: u32) -> Self {
        Self {
            phase,
            sensor_pin_id,
            sensitivity_v_per_a: ampguard_config::nominal_sensitivity(rated_amps).unwrap_or(0.0),
            rated_amps,
        }
    }
}
