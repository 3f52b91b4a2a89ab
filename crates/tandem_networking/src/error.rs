//! # Networking Error Types

use thiserror::Error;

use crate::protocol::{ObjectId, PeerId};

/// Errors raised by a replication transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Only the owner of record may publish an object's pose.
    #[error("peer {peer} does not own object {object}")]
    NotOwner {
        /// The object being published.
        object: ObjectId,
        /// The peer that tried to publish.
        peer: PeerId,
    },

    /// The peer has left the session.
    #[error("peer {0} is disconnected")]
    Disconnected(PeerId),

    /// A packet failed validation on decode.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),
}

/// Errors raised by synced movables and the peer runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The transport refused to hand over ownership.
    #[error("ownership of object {0} was refused")]
    OwnershipRefused(ObjectId),

    /// The pickup gate rejected the local peer.
    #[error("peer {peer} may not pick up object {object}")]
    PickupDenied {
        /// The object.
        object: ObjectId,
        /// The local peer.
        peer: PeerId,
    },

    /// A transport operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No movable with this id exists on the peer.
    #[error("unknown object {0}")]
    UnknownObject(ObjectId),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
