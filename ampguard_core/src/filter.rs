//! Moving-average current filter with a per-phase noise gate.

use crate::noise::NoiseProfile;
use crate::phase::{PHASE_COUNT, Phase, PhaseValues};

/// Samples averaged per phase.
pub const FILTER_DEPTH: usize = 10;

/// Fixed-capacity ring of the last `N` samples, pre-filled with zeros.
///
/// The mean always divides by `N`, so the first `N - 1` pushes after startup
/// read low. The buffer is never cleared. `N` must be at least 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<const N: usize> {
    slots: [f32; N],
    cursor: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self {
            slots: [0.0; N],
            cursor: 0,
        }
    }
}

impl<const N: usize> RingBuffer<N> {
    /// Overwrite the oldest slot.
    #[inline]
    pub fn push(&mut self, v: f32) {
        const { assert!(N > 0, "ring buffer needs at least one slot") };
        self.slots[self.cursor] = v;
        self.cursor = (self.cursor + 1) % N;
    }

    #[inline]
    pub fn mean(&self) -> f32 {
        const { assert!(N > 0, "ring buffer needs at least one slot") };
        self.slots.iter().sum::<f32>() / N as f32
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn slots(&self) -> &[f32; N] {
        &self.slots
    }
}

#[derive(Debug, Clone, Default)]
pub struct CurrentFilter {
    buffers: [RingBuffer<FILTER_DEPTH>; PHASE_COUNT],
}

impl CurrentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `sample` for `phase` and return the gated moving average.
    ///
    /// Means strictly below `threshold` are clamped to exactly 0.0.
    pub fn measure(&mut self, phase: Phase, sample: f32, threshold: f32) -> f32 {
        let buf = &mut self.buffers[phase.index()];
        buf.push(sample);
        let mean = buf.mean();
        if mean < threshold { 0.0 } else { mean }
    }

    /// Run `measure` on all three phases with the profile's thresholds.
    pub fn measure_all(&mut self, samples: &PhaseValues, noise: &NoiseProfile) -> PhaseValues {
        Phase::ALL.map(|p| self.measure(p, samples[p.index()], noise.threshold(p)))
    }

    pub fn buffer(&self, phase: Phase) -> &RingBuffer<FILTER_DEPTH> {
        &self.buffers[phase.index()]
    }
}

/// Mean of the three gated phase currents.
#[inline]
pub fn average_current(currents: &PhaseValues) -> f32 {
    currents.iter().sum::<f32>() / PHASE_COUNT as f32
}
