//! Per-peer view of one synced object.

use std::fmt;

/// Local state of a synced movable.
///
/// ```text
///             pickup                     drop
///   AtRest ───────────▶ LocalAuthoritative ───────▶ AtRest
///     │  ▲                    │ conflict / ownership lost
///     │  │ moving=false       ▼
///     │  └───────────── RemoteTracking ◀──── moving=true
///     │                       │ owner left / went quiet
///     │                       ▼
///     └──────────────── SettlingToRest
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MovableState {
    /// Nobody holds the object. Not registered with the broker.
    AtRest,
    /// This peer owns and holds the object, and is its only writer.
    LocalAuthoritative,
    /// Another peer holds it; the local pose is smoothed toward its snapshots.
    RemoteTracking,
    /// The holder vanished before announcing a release; pose is pinned.
    SettlingToRest,
}

impl MovableState {
    /// Derived motion phase.
    #[must_use]
    pub const fn phase(self) -> MotionPhase {
        match self {
            Self::LocalAuthoritative | Self::RemoteTracking => MotionPhase::Held,
            Self::SettlingToRest => MotionPhase::Releasing,
            Self::AtRest => MotionPhase::Settled,
        }
    }
}

impl fmt::Display for MovableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AtRest => "at-rest",
            Self::LocalAuthoritative => "local-authoritative",
            Self::RemoteTracking => "remote-tracking",
            Self::SettlingToRest => "settling",
        };
        f.write_str(name)
    }
}

/// Tri-state motion flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MotionPhase {
    /// Someone is holding the object.
    Held,
    /// Released, but no final snapshot has confirmed it.
    Releasing,
    /// At rest.
    Settled,
}
