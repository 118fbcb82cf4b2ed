use std::time::Instant;

/// Timing handed to one frame's mask pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    /// Seconds since the clock was started or last reset.
    pub elapsed: f32,
    /// Seconds since the previous tick.
    pub delta: f32,
}

/// Monotonic frame clock; never runs backwards even if `now` does.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            start: now,
            last: now,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.start = now;
        self.last = now;
    }

    pub fn tick(&mut self, now: Instant) -> FrameTiming {
        let delta = now.saturating_duration_since(self.last);
        if now > self.last {
            self.last = now;
        }
        FrameTiming {
            elapsed: self.last.saturating_duration_since(self.start).as_secs_f32(),
            delta: delta.as_secs_f32(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn ticks_report_delta_and_elapsed() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        let first = clock.tick(t0 + Duration::from_millis(16));
        assert!((first.delta - 0.016).abs() < 1e-6);
        let second = clock.tick(t0 + Duration::from_millis(48));
        assert!((second.delta - 0.032).abs() < 1e-6);
        assert!((second.elapsed - 0.048).abs() < 1e-6);
    }

    #[test]
    fn stale_instant_yields_zero_delta() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0 + Duration::from_millis(100));
        let timing = clock.tick(t0);
        assert_eq!(timing.delta, 0.0);
        assert_eq!(timing.elapsed, 0.0);
    }

    #[test]
    fn reset_restarts_elapsed() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new(t0);
        clock.tick(t0 + Duration::from_secs(2));
        clock.reset(t0 + Duration::from_secs(3));
        let timing = clock.tick(t0 + Duration::from_secs(3));
        assert_eq!(timing.elapsed, 0.0);
    }
}
