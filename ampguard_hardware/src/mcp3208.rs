//! MCP3208 8-channel, 12-bit SPI converter.
use ampguard_traits::AnalogInput;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};

pub const CHANNELS: u8 = 8;

pub struct Mcp3208 {
    spi: Spi,
}

impl Mcp3208 {
    /// Opens SPI0/CE0 at `clock_hz` (the part tops out near 2 MHz at 5 V).
    pub fn try_new(clock_hz: u32) -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi })
    }

    /// Single-ended conversion on `channel`.
    pub fn read_channel(&mut self, channel: u8) -> Result<u16> {
        if channel >= CHANNELS {
            return Err(HwError::ChannelOutOfRange(channel));
        }
        let tx = command(channel);
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let value = decode(rx);
        trace!(channel, value, "mcp3208 conversion");
        Ok(value)
    }
}

/// Start bit, single-ended mode, then the channel number split across two bytes.
fn command(channel: u8) -> [u8; 3] {
    [0x06 | (channel >> 2), (channel & 0x03) << 6, 0]
}

fn decode(rx: [u8; 3]) -> u16 {
    (u16::from(rx[1] & 0x0F) << 8) | u16::from(rx[2])
}

impl AnalogInput for Mcp3208 {
    fn read_raw(
        &mut self,
        channel: u8,
    ) -> std::result::Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.read_channel(channel)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_select_channel() {
        assert_eq!(command(0), [0x06, 0x00, 0]);
        assert_eq!(command(5), [0x07, 0x40, 0]);
        assert_eq!(command(7), [0x07, 0xC0, 0]);
    }

    #[test]
    fn decode_keeps_low_twelve_bits() {
        assert_eq!(decode([0xFF, 0xFC, 0x1F]), 0x0C1F);
    }
}
