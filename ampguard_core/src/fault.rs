//! Per-cycle overcurrent and phase-imbalance evaluation.

use std::fmt;

use crate::config::ProtectionCfg;
use crate::phase::{Phase, PhaseValues};

/// Outcome of one evaluation. Closed set; rendered only at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultKind {
    #[default]
    None,
    Overcurrent(Phase),
    Imbalance(Phase, Phase),
}

impl FaultKind {
    #[inline]
    pub fn is_fault(self) -> bool {
        !matches!(self, FaultKind::None)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::None => f.write_str("OK"),
            FaultKind::Overcurrent(p) => write!(f, "Overcurrent {p}"),
            FaultKind::Imbalance(a, b) => write!(f, "Imbalance {a}-{b}"),
        }
    }
}

/// Unordered phase pairs in scan order.
const PAIRS: [(Phase, Phase); 3] = [
    (Phase::L1, Phase::L2),
    (Phase::L1, Phase::L3),
    (Phase::L2, Phase::L3),
];

#[derive(Debug, Clone)]
pub struct FaultDetector {
    overcurrent_trip_a: f32,
    imbalance_limit_a: f32,
    min_current_for_imbalance_a: f32,
}

impl FaultDetector {
    pub fn new(cfg: &ProtectionCfg) -> Self {
        Self {
            overcurrent_trip_a: cfg.overcurrent_trip_a,
            imbalance_limit_a: cfg.imbalance_limit_a,
            min_current_for_imbalance_a: cfg.min_current_for_imbalance_a,
        }
    }

    /// First overcurrent phase wins; imbalance is only checked above the minimum average.
    pub fn evaluate(&self, currents: &PhaseValues, avg: f32) -> FaultKind {
        if let Some(p) = Phase::ALL
            .into_iter()
            .find(|p| currents[p.index()] > self.overcurrent_trip_a)
        {
            return FaultKind::Overcurrent(p);
        }

        if avg > self.min_current_for_imbalance_a {
            if let Some((a, b)) = PAIRS.into_iter().find(|(a, b)| {
                (currents[a.index()] - currents[b.index()]).abs() > self.imbalance_limit_a
            }) {
                return FaultKind::Imbalance(a, b);
            }
        }

        FaultKind::None
    }
}
