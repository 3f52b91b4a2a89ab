//! # Broker Error Types
//!
//! Errors reported by the update broker. None of them are fatal: the broker
//! logs them and keeps ticking.

use thiserror::Error;

use crate::broker::TickTier;
use crate::memory::SlotKey;

/// Errors that can occur when (de)registering subscribers.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// The tier is at its soft capacity; the registration was dropped.
    #[error("{tier} tier is full: capacity {capacity}")]
    CapacityExceeded {
        /// Tier that rejected the registration.
        tier: TickTier,
        /// Configured capacity of that tier.
        capacity: usize,
    },

    /// The key was detached or its ticker was dropped.
    #[error("stale subscriber handle: {0}")]
    StaleHandle(SlotKey),
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Error returned by a failing tick callback.
///
/// Boxed so each subscriber can surface its own error type.
pub type TickError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for tick callbacks.
pub type TickResult = Result<(), TickError>;
