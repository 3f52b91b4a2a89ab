//! Broadcast rate limiting for the authoritative holder.

/// Accumulates tick time and allows one broadcast per interval.
///
/// The accumulator resets to zero (not by subtraction) on every broadcast,
/// so two broadcasts are always more than one interval apart.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BroadcastLimiter {
    interval: f32,
    accumulator: f32,
}

impl BroadcastLimiter {
    /// Creates a limiter allowing one broadcast per `interval` seconds.
    #[must_use]
    pub const fn new(interval: f32) -> Self {
        Self { interval, accumulator: 0.0 }
    }

    /// Creates a limiter for `rate_hz` broadcasts per second.
    #[must_use]
    pub fn from_rate(rate_hz: f32) -> Self {
        Self::new(1.0 / rate_hz)
    }

    /// Adds `dt` and returns true if a broadcast is due now.
    pub fn accumulate(&mut self, dt: f32) -> bool {
        self.accumulator += dt;
        if self.accumulator > self.interval {
            self.accumulator = 0.0;
            true
        } else {
            false
        }
    }

    /// Starts a fresh interval.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Time accumulated since the last broadcast.
    #[must_use]
    pub const fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Seconds between broadcasts.
    #[must_use]
    pub const fn interval(&self) -> f32 {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_most_rate_per_second() {
        for tick_rate in [30.0_f32, 60.0, 90.0, 144.0, 240.0] {
            let mut limiter = BroadcastLimiter::from_rate(20.0);
            let fired = (0..tick_rate as usize)
                .filter(|_| limiter.accumulate(1.0 / tick_rate))
                .count();
            assert!(fired <= 20, "{tick_rate} Hz fired {fired}");
            assert!(fired >= 10, "{tick_rate} Hz fired only {fired}");
        }
    }

    #[test]
    fn test_reset_restarts_interval() {
        let mut limiter = BroadcastLimiter::new(0.05);
        assert!(!limiter.accumulate(0.04));
        limiter.reset();
        assert!(!limiter.accumulate(0.04));
        assert!(limiter.accumulate(0.02));
        assert_eq!(limiter.accumulator(), 0.0);
    }
}
