use crate::phase::Phase;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MonitorError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("invalid state: {0}")]
    State(String),
}

/// Startup failures that leave the controller degraded until the next boot.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationFailure {
    #[error("current sensor not detected on {}", phase_list(.0))]
    SensorMissing(Vec<Phase>),
    #[error("noise level {noise_a:.3} A exceeds ceiling {ceiling_a:.3} A")]
    NoiseTooHigh { noise_a: f32, ceiling_a: f32 },
}

fn phase_list(phases: &[Phase]) -> String {
    phases
        .iter()
        .map(|p| p.label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing analog input")]
    MissingAdc,
    #[error("missing relay output")]
    MissingRelay,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
