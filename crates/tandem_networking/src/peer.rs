//! # Peer Runtime
//!
//! One peer's frame loop: network events first, then the broker.
//!
//! ## Frame Order
//!
//! ```text
//! 1. Input events (pickup / drop / move_held) - any time between frames
//! 2. pump_network: drain inbound snapshots and peer departures
//! 3. broker.tick: holders broadcast, trackers smooth, slow tier checks liveness
//! ```
//!
//! Every step runs on the caller's thread; nothing here blocks.

use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;
use tandem_core::{SubscriberKey, UpdateBroker};
use tandem_shared::{Pose, SyncConfig, TandemConfig};

use crate::error::{SyncError, SyncResult};
use crate::movable::SyncedMovable;
use crate::protocol::{NetEvent, ObjectId, PeerId};
use crate::transport::{CollisionProxy, ReplicationLink};

/// Shared handle to a replica.
pub type MovableHandle<L, C> = Arc<Mutex<SyncedMovable<L, C>>>;

/// Peer statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// Frames executed.
    pub frames: u64,
    /// Inbound events processed.
    pub events: u64,
    /// Snapshots for objects this peer does not know.
    pub unknown_objects: u64,
    /// Peers seen joining.
    pub peers_joined: u64,
    /// Peers seen leaving.
    pub peers_left: u64,
}

struct MovableEntry<L: ReplicationLink, C: CollisionProxy> {
    movable: MovableHandle<L, C>,
    key: SubscriberKey,
}

/// A session participant driving its own replicas.
pub struct SyncPeer<L: ReplicationLink + 'static, C: CollisionProxy + 'static> {
    broker: UpdateBroker,
    link: Arc<L>,
    inbound: Receiver<NetEvent>,
    sync: SyncConfig,
    movables: BTreeMap<ObjectId, MovableEntry<L, C>>,
    inbound_closed: bool,
    stats: PeerStats,
}

impl<L: ReplicationLink + 'static, C: CollisionProxy + 'static> SyncPeer<L, C> {
    /// Creates a peer around a connected link.
    #[must_use]
    pub fn new(link: L, inbound: Receiver<NetEvent>, config: &TandemConfig) -> Self {
        Self {
            broker: UpdateBroker::new(config.broker),
            link: Arc::new(link),
            inbound,
            sync: config.sync,
            movables: BTreeMap::new(),
            inbound_closed: false,
            stats: PeerStats::default(),
        }
    }

    /// This peer's id.
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.link.local_peer()
    }

    /// Creates the local replica of `object`, at rest at `initial`.
    ///
    /// Spawning an id twice replaces the previous replica.
    pub fn spawn_movable(&mut self, object: ObjectId, initial: Pose, collider: C) -> MovableHandle<L, C> {
        let movable = Arc::new(Mutex::new(SyncedMovable::new(
            object,
            initial,
            Arc::clone(&self.link),
            collider,
            self.sync,
        )));
        let key = self.broker.attach(&movable);
        movable.lock().bind(key);

        let entry = MovableEntry { movable: Arc::clone(&movable), key };
        if let Some(previous) = self.movables.insert(object, entry) {
            tracing::warn!("Peer {} replaced replica of object {}", self.id(), object);
            self.broker.detach(previous.key);
        }
        movable
    }

    /// Local pickup of `object`.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownObject`] or whatever the replica refuses with.
    pub fn pickup(&mut self, object: ObjectId) -> SyncResult<()> {
        let entry = self.movables.get(&object).ok_or(SyncError::UnknownObject(object))?;
        entry.movable.lock().trigger_hold(&mut self.broker)
    }

    /// Local drop of `object`.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownObject`] or a transport error on the final push.
    pub fn drop_object(&mut self, object: ObjectId) -> SyncResult<()> {
        let entry = self.movables.get(&object).ok_or(SyncError::UnknownObject(object))?;
        entry.movable.lock().trigger_release(&mut self.broker)
    }

    /// Moves a locally held object. Returns false if it is not held here.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownObject`].
    pub fn move_held(&mut self, object: ObjectId, pose: Pose) -> SyncResult<bool> {
        let entry = self.movables.get(&object).ok_or(SyncError::UnknownObject(object))?;
        let moved = entry.movable.lock().set_held_pose(pose);
        Ok(moved)
    }

    /// Drains every pending inbound event. Returns the number handled.
    pub fn pump_network(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.inbound.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.inbound_closed {
                        self.inbound_closed = true;
                        tracing::warn!("Peer {} inbound channel closed", self.id());
                    }
                    break;
                }
            };
            self.handle_event(event);
            handled += 1;
        }
        self.stats.events += handled as u64;
        handled
    }

    fn handle_event(&mut self, event: NetEvent) {
        let now = self.broker.clock();
        match event {
            NetEvent::Snapshot(snapshot) => match self.movables.get(&snapshot.object) {
                Some(entry) => {
                    entry.movable.lock().on_snapshot_received(&snapshot, &mut self.broker, now);
                }
                None => {
                    self.stats.unknown_objects += 1;
                    tracing::debug!(
                        "Peer {} got a snapshot for unknown object {}",
                        self.link.local_peer(),
                        snapshot.object
                    );
                }
            },
            NetEvent::PeerJoined(peer) => {
                self.stats.peers_joined += 1;
                tracing::debug!("Peer {} sees peer {} join", self.link.local_peer(), peer);
            }
            NetEvent::PeerLeft(peer) => {
                self.stats.peers_left += 1;
                tracing::info!("Peer {} sees peer {} leave", self.link.local_peer(), peer);
                for entry in self.movables.values() {
                    entry.movable.lock().on_peer_left(peer, &mut self.broker);
                }
            }
        }
    }

    /// Runs one frame: network events, then the broker.
    pub fn tick(&mut self, dt: f32) {
        self.pump_network();
        self.broker.tick(dt);
        self.stats.frames += 1;
    }

    /// Replica of `object`.
    #[must_use]
    pub fn movable(&self, object: ObjectId) -> Option<&MovableHandle<L, C>> {
        self.movables.get(&object).map(|entry| &entry.movable)
    }

    /// Object ids with a local replica, ascending.
    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.movables.keys().copied()
    }

    /// The peer's broker.
    #[must_use]
    pub const fn broker(&self) -> &UpdateBroker {
        &self.broker
    }

    /// The peer's link.
    #[must_use]
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Peer statistics.
    #[must_use]
    pub const fn stats(&self) -> &PeerStats {
        &self.stats
    }
}
