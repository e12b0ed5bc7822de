//! Small numeric helpers shared by calibration and the control loop.

/// Integer percentage of `done` out of `total`, clamped to 100.
#[inline]
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let p = (done.min(total) as u64 * 100) / total as u64;
    u8::try_from(p).unwrap_or(100)
}

/// Emits a percentage each time progress crosses the next `step` boundary.
///
/// A step of 0 disables reporting.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    step: u8,
    next: u8,
}

impl ProgressTracker {
    pub fn new(total: usize, step_pct: u8) -> Self {
        Self {
            total,
            step: step_pct.min(100),
            next: step_pct.min(100),
        }
    }

    /// Report `done` items; returns the percentage if a boundary was crossed.
    pub fn advance(&mut self, done: usize) -> Option<u8> {
        if self.step == 0 || self.next > 100 {
            return None;
        }
        let p = percent(done, self.total);
        if p < self.next {
            return None;
        }
        // skip every boundary already passed so each percentage is emitted once
        while self.next <= p {
            self.next = self.next.saturating_add(self.step);
        }
        Some(p)
    }
}

/// Milliseconds elapsed from `since` to `now`, zero if the clock went backwards.
#[inline]
pub fn elapsed_ms(now_ms: u64, since_ms: u64) -> u64 {
    now_ms.saturating_sub(since_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_clamps_and_handles_empty() {
        assert_eq!(percent(5, 10), 50);
        assert_eq!(percent(20, 10), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn tracker_reports_each_step_once() {
        let mut t = ProgressTracker::new(20, 10);
        let reported: Vec<u8> = (1..=20).filter_map(|i| t.advance(i)).collect();
        assert_eq!(reported, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn tracker_collapses_big_jumps() {
        let mut t = ProgressTracker::new(3, 10);
        let reported: Vec<u8> = (1..=3).filter_map(|i| t.advance(i)).collect();
        assert_eq!(reported, vec![33, 66, 100]);
    }

    #[test]
    fn zero_step_is_silent() {
        let mut t = ProgressTracker::new(10, 0);
        assert!((1..=10).all(|i| t.advance(i).is_none()));
    }
}
