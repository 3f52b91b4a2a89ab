//! # Remote Pose Smoothing
//!
//! Non-owner peers never render the raw snapshot stream: packets arrive at
//! most 20 times a second with jitter, which looks like stutter. Instead the
//! local pose glides toward the latest snapshot:
//!
//! ```text
//! factor = decay ^ dt
//! pos    = pos * factor + target * (1 - factor)
//! rot    = slerp(rot, target, 1 - factor)
//! ```
//!
//! After `T` seconds of ticks the remaining error is exactly
//! `initial * decay^T`, whatever the frame rate. With `decay = 0.001` the
//! error is 0.1% after one second and never overshoots.

use tandem_shared::{Pose, SMOOTHING_DECAY};

/// Frame-rate independent exponential smoother.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialSmoother {
    decay: f32,
}

impl ExponentialSmoother {
    /// Creates a smoother. `decay` is the error fraction left after one second.
    #[must_use]
    pub fn new(decay: f32) -> Self {
        debug_assert!(decay > 0.0 && decay < 1.0, "decay must be in (0, 1)");
        Self { decay }
    }

    /// Error fraction left after one second.
    #[must_use]
    pub const fn decay(&self) -> f32 {
        self.decay
    }

    /// Fraction of the current error that survives a step of `dt` seconds.
    #[inline]
    #[must_use]
    pub fn retain_factor(&self, dt: f32) -> f32 {
        self.decay.powf(dt.max(0.0))
    }

    /// Moves `current` toward `target` by one step of `dt` seconds.
    #[must_use]
    pub fn step(&self, current: Pose, target: Pose, dt: f32) -> Pose {
        let factor = self.retain_factor(dt);
        let blend = 1.0 - factor;
        Pose::new(
            current.position.lerp(target.position, blend),
            current.rotation.slerp(target.rotation, blend),
        )
    }

    /// Upper bound on the positional error after `elapsed` seconds.
    #[must_use]
    pub fn error_bound(&self, initial: f32, elapsed: f32) -> f32 {
        initial * self.retain_factor(elapsed)
    }
}

impl Default for ExponentialSmoother {
    fn default() -> Self {
        Self::new(SMOOTHING_DECAY)
    }
}
