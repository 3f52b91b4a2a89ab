//! # TANDEM Networking - Shared Objects
//!
//! Single-writer pose replication for objects that any peer may pick up.
//!
//! ## Architecture
//!
//! - **Protocol**: fixed-size `Pod` snapshot packets, ordered by `(epoch, sequence, owner)`
//! - **Transport**: ownership registry plus publish/inbound channels
//! - **Movable**: the per-peer state machine (at rest, holding, tracking, settling)
//! - **Interpolation**: frame-rate independent smoothing on non-owners
//! - **Peer**: one peer's frame loop around its own update broker
//!
//! ## Authority Model
//!
//! ```text
//! HOLDER (owner of record)           EVERY OTHER PEER
//!   |                                  |
//!   |--- pickup push (moving) -------->| -> RemoteTracking, smooth
//!   |--- pose @ <= 20 Hz ------------->| -> new target
//!   |--- drop push (at rest) --------->| -> AtRest, pinned exactly
//!   |                                  |
//! ```
//!
//! Nobody but the owner of record ever writes the pose. A peer that loses
//! ownership while holding releases without a word.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_networking::{LoopbackHub, SyncPeer, ColliderFlag};
//!
//! let hub = LoopbackHub::new();
//! let (link, inbound) = hub.connect();
//! let mut peer = SyncPeer::new(link, inbound, &TandemConfig::default());
//! peer.spawn_movable(1, Pose::IDENTITY, ColliderFlag::new());
//! peer.pickup(1)?;
//! peer.tick(1.0 / 60.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod interpolation;
pub mod movable;
pub mod peer;
pub mod protocol;
pub mod simulation;
pub mod transport;

pub use error::{SyncError, SyncResult, TransportError};
pub use interpolation::ExponentialSmoother;
pub use movable::{
    AllowAll, BroadcastLimiter, MotionPhase, MovableState, MovableStats, PickupGate, SyncedMovable,
};
pub use peer::{MovableHandle, PeerStats, SyncPeer};
pub use protocol::{
    serial_after, NetEvent, ObjectId, OrderKey, OwnershipEpoch, PeerId, PoseSnapshot,
    SequenceNumber, SnapshotPacket,
};
pub use simulation::{NetworkConditions, SimpleRng};
pub use transport::{
    ColliderFlag, CollisionProxy, HubStats, LoopbackHub, LoopbackLink, ReplicationLink,
};
