//! Maps `Box<dyn Error>` from trait boundaries to typed `MonitorError`.
//!
//! The traits in `ampguard_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `ampguard_hardware::HwError` downcasting.

use crate::error::MonitorError;

/// Map a trait-boundary error to a typed `MonitorError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to the error's display text.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> MonitorError {
    #[cfg(feature = "hardware-errors")]
    {
        use ampguard_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Gpio(_) | HwError::Spi(_) => MonitorError::HardwareFault(hw.to_string()),
                other => MonitorError::Hardware(other.to_string()),
            };
        }
    }

    MonitorError::Hardware(e.to_string())
}
