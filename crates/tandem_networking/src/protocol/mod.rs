//! # Replication Protocol
//!
//! Binary snapshot packets with per-object ordering.
//!
//! ## Packet Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ object (4) │ owner (4) │ epoch (4) │ sequence (4) │ flags (4) │
//! ├──────────────────────────────────────────────────────────────┤
//! │ position: 3 x f32 (12)                                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ rotation: 4 x f32 (16)                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! Every ownership grant bumps the object's epoch in the registry, and the
//! holder stamps its snapshots with the epoch it was granted. Within an
//! epoch, a writer stamps each snapshot with one more than the highest
//! sequence it has seen for that object. Receivers apply a snapshot only if
//! its `(epoch, sequence, owner)` comes after the last one applied, so late,
//! duplicated and reordered deliveries are dropped, and packets a previous
//! holder still had in flight never outrank the new holder.
//!
//! Epochs and sequences wrap and are compared with serial-number arithmetic.

mod packets;

pub use packets::SnapshotPacket;

use tandem_shared::{Pose, Quaternion, Vec3};

use crate::error::TransportError;

/// Replicated object identifier.
pub type ObjectId = u32;

/// Session peer identifier.
pub type PeerId = u32;

/// Per-object snapshot sequence number.
pub type SequenceNumber = u32;

/// Per-object ownership epoch, bumped on every ownership grant.
pub type OwnershipEpoch = u32;

/// Returns true if `a` is ahead of `b` by less than half the number space.
#[inline]
#[must_use]
pub const fn serial_after(a: u32, b: u32) -> bool {
    a != b && a.wrapping_sub(b) < 1 << 31
}

/// Position of a snapshot in its object's history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderKey {
    /// Ownership epoch.
    pub epoch: OwnershipEpoch,
    /// Sequence within the object's history.
    pub sequence: SequenceNumber,
    /// Writer, used only to break ties.
    pub owner: PeerId,
}

impl OrderKey {
    /// Returns true if `self` comes strictly after `other`.
    #[must_use]
    pub const fn follows(self, other: Self) -> bool {
        if self.epoch != other.epoch {
            return serial_after(self.epoch, other.epoch);
        }
        if self.sequence != other.sequence {
            return serial_after(self.sequence, other.sequence);
        }
        self.owner > other.owner
    }
}

/// Decoded authoritative snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseSnapshot {
    /// Object being described.
    pub object: ObjectId,
    /// Peer that wrote it.
    pub owner: PeerId,
    /// Ownership epoch the writer held the object under.
    pub epoch: OwnershipEpoch,
    /// Per-object sequence number.
    pub sequence: SequenceNumber,
    /// Authoritative pose.
    pub pose: Pose,
    /// True while the owner is holding the object.
    pub moving: bool,
}

impl PoseSnapshot {
    /// Ordering key used to reject stale snapshots.
    #[inline]
    #[must_use]
    pub const fn order_key(&self) -> OrderKey {
        OrderKey {
            epoch: self.epoch,
            sequence: self.sequence,
            owner: self.owner,
        }
    }

    /// Returns true if this snapshot supersedes `last`.
    #[inline]
    #[must_use]
    pub fn is_newer_than(&self, last: Option<OrderKey>) -> bool {
        last.map_or(true, |last| self.order_key().follows(last))
    }

    /// Converts to the wire packet.
    #[must_use]
    pub fn to_packet(&self) -> SnapshotPacket {
        SnapshotPacket {
            object: self.object,
            owner: self.owner,
            epoch: self.epoch,
            sequence: self.sequence,
            flags: if self.moving { SnapshotPacket::FLAG_MOVING } else { 0 },
            position: self.pose.position.to_array(),
            rotation: self.pose.rotation.to_array(),
        }
    }

    /// Validates a wire packet.
    ///
    /// # Errors
    ///
    /// [`TransportError::MalformedPacket`] for unknown flags or a
    /// non-finite pose.
    pub fn from_packet(packet: &SnapshotPacket) -> Result<Self, TransportError> {
        if packet.flags & !SnapshotPacket::KNOWN_FLAGS != 0 {
            return Err(TransportError::MalformedPacket("unknown flags"));
        }

        let pose = Pose::new(
            Vec3::from_array(packet.position),
            Quaternion::from_array(packet.rotation),
        );
        if !(pose.position.is_finite() && pose.rotation.is_finite()) {
            return Err(TransportError::MalformedPacket("non-finite pose"));
        }

        Ok(Self {
            object: packet.object,
            owner: packet.owner,
            epoch: packet.epoch,
            sequence: packet.sequence,
            pose,
            moving: packet.is_moving(),
        })
    }

    /// Encodes to wire bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; SnapshotPacket::SIZE] {
        let mut out = [0u8; SnapshotPacket::SIZE];
        out.copy_from_slice(bytemuck::bytes_of(&self.to_packet()));
        out
    }

    /// Decodes wire bytes.
    ///
    /// # Errors
    ///
    /// [`TransportError::MalformedPacket`] for a wrong length or an invalid
    /// packet.
    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        if bytes.len() != SnapshotPacket::SIZE {
            return Err(TransportError::MalformedPacket("wrong length"));
        }
        let packet: SnapshotPacket = bytemuck::try_pod_read_unaligned(bytes)
            .map_err(|_| TransportError::MalformedPacket("unreadable"))?;
        Self::from_packet(&packet)
    }
}

/// Event delivered to a peer's inbound channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NetEvent {
    /// A replicated snapshot arrived.
    Snapshot(PoseSnapshot),
    /// A peer joined the session.
    PeerJoined(PeerId),
    /// A peer left the session.
    PeerLeft(PeerId),
}
