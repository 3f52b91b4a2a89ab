//! # Transport Interfaces
//!
//! What a synced movable needs from the world around it.
//!
//! ```text
//! SyncedMovable uses:       Host implements:
//! ┌──────────────────┐      ┌──────────────────┐
//! │ ReplicationLink  │ ←─── │ LoopbackLink,    │
//! │ CollisionProxy   │      │ engine bindings  │
//! └──────────────────┘      └──────────────────┘
//! ```
//!
//! The ownership registry is the only "lock" on a shared object: a peer
//! writes a pose only while it is the owner of record.

mod loopback;

pub use loopback::{HubStats, LoopbackHub, LoopbackLink};

use crate::error::TransportError;
use crate::protocol::{ObjectId, OwnershipEpoch, PeerId, PoseSnapshot};

/// Ownership and replication primitives of a session.
pub trait ReplicationLink: Send + Sync {
    /// This peer's id.
    fn local_peer(&self) -> PeerId;

    /// Makes the local peer the owner of `object`.
    ///
    /// Every grant starts a new ownership epoch for the object. Returns false
    /// if the transport refused.
    fn request_ownership(&self, object: ObjectId) -> bool;

    /// Epoch of the most recent ownership grant of `object` (0 before any).
    fn ownership_epoch(&self, object: ObjectId) -> OwnershipEpoch;

    /// Current owner of record, if any peer is connected.
    fn owner_of(&self, object: ObjectId) -> Option<PeerId>;

    /// Returns true if `peer` is the owner of record.
    fn is_owner(&self, object: ObjectId, peer: PeerId) -> bool {
        self.owner_of(object) == Some(peer)
    }

    /// Sends a snapshot to every other peer.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotOwner`] unless the local peer owns the object,
    /// [`TransportError::Disconnected`] after leaving the session.
    fn publish(&self, snapshot: &PoseSnapshot) -> Result<(), TransportError>;
}

/// The object's local collider.
///
/// Disabled while held so the carried object does not collide with the
/// hand that carries it.
pub trait CollisionProxy: Send {
    /// Enables or disables collision.
    fn set_collidable(&mut self, collidable: bool);

    /// Current collision state.
    fn is_collidable(&self) -> bool;
}

/// Collider that only records its state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColliderFlag {
    collidable: bool,
    toggles: u32,
}

impl ColliderFlag {
    /// Creates an enabled collider.
    #[must_use]
    pub const fn new() -> Self {
        Self { collidable: true, toggles: 0 }
    }

    /// Number of actual state changes.
    #[must_use]
    pub const fn toggles(&self) -> u32 {
        self.toggles
    }
}

impl Default for ColliderFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionProxy for ColliderFlag {
    fn set_collidable(&mut self, collidable: bool) {
        if self.collidable != collidable {
            self.collidable = collidable;
            self.toggles += 1;
        }
    }

    fn is_collidable(&self) -> bool {
        self.collidable
    }
}
