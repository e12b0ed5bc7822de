pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Analog front end shared by all current sensors.
///
/// Resolution and attenuation are fixed by whoever constructs the implementation;
/// the controller never reconfigures them.
pub trait AnalogInput {
    /// One raw conversion from `channel`, in `[0, resolution - 1]`.
    fn read_raw(&mut self, channel: u8) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
}

/// Relay (or optocoupler) output that energizes the protected load.
pub trait LoadSwitch {
    /// `true` connects the load, `false` disconnects it.
    fn set_load(&mut self, connected: bool)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for Box<T> {
    fn read_raw(&mut self, channel: u8) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_raw(channel)
    }
}

impl<T: LoadSwitch + ?Sized> LoadSwitch for Box<T> {
    fn set_load(
        &mut self,
        connected: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_load(connected)
    }
}
