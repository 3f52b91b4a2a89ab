//! # Synchronization Constants
//!
//! Defaults for every tunable in [`crate::config`]. A TOML file overrides
//! them at startup.

pub use tandem_core::DEFAULT_TIER_CAPACITY;

// =============================================================================
// TICKING
// =============================================================================

/// Simulation tick rate used by the bundled simulation (updates per second).
pub const TICK_RATE: u32 = 60;

// =============================================================================
// REPLICATION
// =============================================================================

/// Authoritative broadcasts per second while an object is held.
pub const BROADCAST_RATE_HZ: f32 = 20.0;

/// Fraction of the remaining error left after one second of smoothing.
pub const SMOOTHING_DECAY: f32 = 0.001;

// =============================================================================
// QUANTIZATION
// =============================================================================

/// Position grid for snapped broadcasts (world units).
pub const POSITION_GRID: f32 = 0.35;

/// Euler angle step for snapped broadcasts (degrees).
pub const ANGLE_STEP_DEGREES: f32 = 30.0;
