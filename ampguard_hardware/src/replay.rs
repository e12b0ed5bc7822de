//! Raw trace playback.

use ampguard_traits::AnalogInput;
use tracing::debug;

use crate::error::HwError;

/// Replays recorded `[l1, l2, l3]` codes.
///
/// Each phase keeps its own cursor, so every read of a phase consumes the next row for that
/// phase. Once the trace runs out the last row repeats.
#[derive(Debug, Clone)]
pub struct ReplayAdc {
    rows: Vec<[u16; 3]>,
    pins: [u8; 3],
    cursors: [usize; 3],
    exhausted: bool,
}

impl ReplayAdc {
    /// `pins` maps ADC channels to the trace columns in L1, L2, L3 order.
    pub fn new(rows: Vec<[u16; 3]>, pins: [u8; 3]) -> Result<Self, HwError> {
        if rows.is_empty() {
            return Err(HwError::EmptyTrace);
        }
        Ok(Self {
            rows,
            pins,
            cursors: [0; 3],
            exhausted: false,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows consumed so far by the slowest phase.
    pub fn position(&self) -> usize {
        self.cursors.iter().copied().min().unwrap_or(0)
    }

    fn column(&self, channel: u8) -> Result<usize, HwError> {
        self.pins
            .iter()
            .position(|&p| p == channel)
            .ok_or(HwError::ChannelOutOfRange(channel))
    }

    fn next_code(&mut self, column: usize) -> u16 {
        let last = self.rows.len() - 1;
        let idx = self.cursors[column].min(last);
        if self.cursors[column] <= last {
            self.cursors[column] += 1;
        } else if !self.exhausted {
            self.exhausted = true;
            debug!(rows = self.rows.len(), "replay trace exhausted, holding last row");
        }
        self.rows[idx][column]
    }
}

impl AnalogInput for ReplayAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        let column = self.column(channel)?;
        Ok(self.next_code(column))
    }
}
