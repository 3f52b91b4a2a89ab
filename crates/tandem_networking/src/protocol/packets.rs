//! # Packet Definitions
//!
//! The one packet the replication protocol needs: an authoritative pose.
//!
//! The packet is `Copy`, fixed-size and `Pod`, so encoding is a plain byte
//! copy and decoding is a length check plus validation.

use bytemuck::{Pod, Zeroable};

/// Authoritative pose packet - owner -> every other peer.
///
/// Size: 48 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SnapshotPacket {
    /// Object being described.
    pub object: u32,
    /// Peer that wrote this snapshot.
    pub owner: u32,
    /// Ownership epoch the writer held the object under.
    pub epoch: u32,
    /// Per-object sequence number.
    pub sequence: u32,
    /// State flags (see `FLAG_*`).
    pub flags: u32,
    /// Position (x, y, z).
    pub position: [f32; 3],
    /// Rotation quaternion (x, y, z, w).
    pub rotation: [f32; 4],
}

impl SnapshotPacket {
    /// Size in bytes.
    pub const SIZE: usize = 48;

    /// Flag: the object is held and moving.
    pub const FLAG_MOVING: u32 = 1 << 0;

    /// Every flag this protocol version understands.
    pub const KNOWN_FLAGS: u32 = Self::FLAG_MOVING;

    /// Returns true if the moving flag is set.
    #[inline]
    #[must_use]
    pub const fn is_moving(&self) -> bool {
        self.flags & Self::FLAG_MOVING != 0
    }
}

const _: () = assert!(std::mem::size_of::<SnapshotPacket>() == SnapshotPacket::SIZE);
