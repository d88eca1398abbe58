use std::collections::VecDeque;
use std::time::Duration;

/// Shortest duration counted, so an instantaneous frame stays finite
const MIN_FRAME_DURATION: Duration = Duration::from_micros(1);

/// Cycles-per-second meter smoothed over the most recent frames
#[derive(Debug, Clone)]
pub struct CpsMeter {
    window_size: usize,
    durations: VecDeque<Duration>,
    cps: u32,
}

impl CpsMeter {
    /// # Panics
    ///
    /// Panics if `window_size` is 0
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        Self {
            window_size,
            durations: VecDeque::with_capacity(window_size),
            cps: 0,
        }
    }

    /// Record one processed frame and return the updated CPS
    pub fn record(&mut self, duration: Duration) -> u32 {
        if self.durations.len() >= self.window_size {
            self.durations.pop_front();
        }
        self.durations.push_back(duration.max(MIN_FRAME_DURATION));

        // Integer rate per frame, then the integer mean of those rates
        let total: f64 = self
            .durations
            .iter()
            .map(|d| (1.0 / d.as_secs_f64()).floor())
            .sum();
        self.cps = (total / self.durations.len() as f64).floor() as u32;
        self.cps
    }

    /// Last reported CPS, 0 before the first frame
    pub fn cps(&self) -> u32 {
        self.cps
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn reset(&mut self) {
        self.durations.clear();
        self.cps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cps_average() {
        let mut meter = CpsMeter::new(3);
        assert_eq!(meter.cps(), 0);

        assert_eq!(meter.record(Duration::from_millis(100)), 10);
        assert_eq!(meter.record(Duration::from_millis(50)), 15);
        assert_eq!(meter.record(Duration::from_millis(40)), 18);

        // Window is full, the 100ms frame is dropped: (20 + 25 + 50) / 3
        assert_eq!(meter.record(Duration::from_millis(20)), 31);
        assert_eq!(meter.len(), 3);
    }

    #[test]
    fn test_per_frame_rate_is_truncated() {
        let mut meter = CpsMeter::new(20);
        // 1 / 0.3s = 3.33 -> 3
        assert_eq!(meter.record(Duration::from_millis(300)), 3);
    }

    #[test]
    fn test_zero_duration_is_finite() {
        let mut meter = CpsMeter::new(20);
        assert!(meter.record(Duration::ZERO) >= 999_999);
    }

    #[test]
    fn test_reset() {
        let mut meter = CpsMeter::new(2);
        meter.record(Duration::from_millis(10));
        meter.reset();
        assert!(meter.is_empty());
        assert_eq!(meter.cps(), 0);
    }
}
