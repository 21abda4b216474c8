use std::time::Duration;

/// A frame delivered later than the tolerance allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingDrift {
    pub frame: u64,
    pub expected: Duration,
    pub actual: Duration,
}

impl TimingDrift {
    pub fn lateness(&self) -> Duration {
        self.actual.saturating_sub(self.expected)
    }
}

/// Compares consecutive tick timestamps against the nominal refresh period.
#[derive(Debug, Clone)]
pub struct DriftMonitor {
    expected: Duration,
    tolerance: Duration,
    last_ns: Option<u64>,
    frame: u64,
    late_frames: u64,
}

impl DriftMonitor {
    /// `expected` is the nominal refresh period.
    pub fn new(expected: Duration, tolerance: Duration) -> Self {
        Self {
            expected,
            tolerance,
            last_ns: None,
            frame: 0,
            late_frames: 0,
        }
    }

    pub fn expected(&self) -> Duration {
        self.expected
    }

    /// Feeds the timestamp of a tick; returns the interval since the previous
    /// tick and a drift report if it ran late.
    pub fn observe(&mut self, now_ns: u64) -> (Option<Duration>, Option<TimingDrift>) {
        let frame = self.frame;
        self.frame += 1;
        let Some(last) = self.last_ns.replace(now_ns) else {
            return (None, None);
        };
        let actual = Duration::from_nanos(now_ns.saturating_sub(last));
        if actual > self.expected.saturating_add(self.tolerance) {
            self.late_frames += 1;
            let drift = TimingDrift {
                frame,
                expected: self.expected,
                actual,
            };
            return (Some(actual), Some(drift));
        }
        (Some(actual), None)
    }

    /// Forgets the previous tick, e.g. after a deliberate pause.
    pub fn reset(&mut self) {
        self.last_ns = None;
    }

    pub fn late_frames(&self) -> u64 {
        self.late_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_only_late_frames() {
        let mut monitor = DriftMonitor::new(Duration::from_millis(20), Duration::from_millis(5));
        assert_eq!(monitor.observe(0), (None, None));
        let (interval, drift) = monitor.observe(20_000_000);
        assert_eq!(interval, Some(Duration::from_millis(20)));
        assert!(drift.is_none());
        let (_, drift) = monitor.observe(46_000_000);
        let drift = drift.unwrap();
        assert_eq!(drift.frame, 2);
        assert_eq!(drift.lateness(), Duration::from_millis(6));
        assert_eq!(monitor.late_frames(), 1);
    }

    #[test]
    fn reset_skips_the_pause_interval() {
        let mut monitor =
            DriftMonitor::new(Duration::from_nanos(16_666_667), Duration::from_millis(2));
        monitor.observe(0);
        monitor.reset();
        assert_eq!(monitor.observe(5_000_000_000), (None, None));
    }
}
