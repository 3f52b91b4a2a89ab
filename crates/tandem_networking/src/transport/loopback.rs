//! # Loopback Transport
//!
//! An in-process session: every peer gets a link and an inbound channel.
//!
//! ```text
//!   LoopbackLink(1) ──publish──┐                 ┌──▶ inbound(2)
//!                              ▼                 │
//!                        [ encode ] ─▶ in-flight ┼──▶ inbound(3)
//!                                     (delay)    │
//!   LoopbackLink(2) ──publish──▶ ...             └──▶ ...
//! ```
//!
//! The first peer to connect is the coordinator and owns every object
//! nobody has claimed. When the coordinator leaves, the lowest remaining
//! peer id takes over, along with the departing peer's objects.
//!
//! A joining peer gets the newest snapshot of every object, followed by a
//! `PeerLeft` for each holder that left while still moving its object.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::error::TransportError;
use crate::protocol::{NetEvent, ObjectId, OwnershipEpoch, PeerId, PoseSnapshot, SnapshotPacket};
use crate::simulation::{NetworkConditions, SimpleRng};
use crate::transport::ReplicationLink;

/// Hub traffic statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Snapshots accepted from owners.
    pub packets_sent: u64,
    /// Snapshots handed to a peer's inbound channel.
    pub packets_delivered: u64,
    /// Snapshots that waited in flight.
    pub packets_delayed: u64,
    /// Snapshots whose recipient was gone.
    pub packets_dropped: u64,
    /// Snapshots that failed to decode.
    pub malformed: u64,
    /// Publishes refused for lack of ownership.
    pub rejected_publishes: u64,
}

/// Ownership of record.
struct Registry {
    owners: HashMap<ObjectId, PeerId>,
    epochs: HashMap<ObjectId, OwnershipEpoch>,
    coordinator: Option<PeerId>,
}

impl Registry {
    fn owner_of(&self, object: ObjectId) -> Option<PeerId> {
        self.owners.get(&object).copied().or(self.coordinator)
    }

    fn epoch_of(&self, object: ObjectId) -> OwnershipEpoch {
        self.epochs.get(&object).copied().unwrap_or(0)
    }

    /// Records `peer` as owner under a fresh epoch.
    fn grant(&mut self, object: ObjectId, peer: PeerId) -> OwnershipEpoch {
        self.owners.insert(object, peer);
        let epoch = self.epochs.entry(object).or_insert(0);
        *epoch = epoch.wrapping_add(1);
        *epoch
    }
}

struct InFlight {
    deliver_at: u64,
    order: u64,
    to: PeerId,
    bytes: [u8; SnapshotPacket::SIZE],
}

struct Routing {
    peers: BTreeMap<PeerId, Sender<NetEvent>>,
    /// Newest snapshot per object, replayed to late joiners.
    latest: HashMap<ObjectId, PoseSnapshot>,
    in_flight: Vec<InFlight>,
    next_peer: PeerId,
    next_order: u64,
    now: u64,
    conditions: NetworkConditions,
    rng: SimpleRng,
    stats: HubStats,
}

impl Routing {
    fn record_latest(&mut self, snapshot: PoseSnapshot) {
        let newer = self
            .latest
            .get(&snapshot.object)
            .map_or(true, |cached| snapshot.is_newer_than(Some(cached.order_key())));
        if newer {
            self.latest.insert(snapshot.object, snapshot);
        }
    }

    fn broadcast(&mut self, from: PeerId, bytes: [u8; SnapshotPacket::SIZE]) {
        for (&to, sender) in &self.peers {
            if to == from {
                continue;
            }
            let delay = self.conditions.delay_ticks(self.rng.next_u32());
            if delay == 0 {
                Self::deliver(sender, &bytes, &mut self.stats);
            } else {
                self.in_flight.push(InFlight {
                    deliver_at: self.now + u64::from(delay),
                    order: self.next_order,
                    to,
                    bytes,
                });
                self.next_order += 1;
                self.stats.packets_delayed += 1;
            }
        }
    }

    fn deliver(sender: &Sender<NetEvent>, bytes: &[u8], stats: &mut HubStats) {
        match PoseSnapshot::decode(bytes) {
            Ok(snapshot) => {
                if sender.send(NetEvent::Snapshot(snapshot)).is_ok() {
                    stats.packets_delivered += 1;
                } else {
                    stats.packets_dropped += 1;
                }
            }
            Err(err) => {
                stats.malformed += 1;
                tracing::warn!("Dropping packet: {}", err);
            }
        }
    }
}

struct HubShared {
    registry: RwLock<Registry>,
    routing: Mutex<Routing>,
}

impl HubShared {
    fn is_connected(&self, peer: PeerId) -> bool {
        self.routing.lock().peers.contains_key(&peer)
    }

    fn disconnect(&self, peer: PeerId) -> bool {
        let mut routing = self.routing.lock();
        if routing.peers.remove(&peer).is_none() {
            return false;
        }
        routing.in_flight.retain(|packet| packet.to != peer);
        let lowest = routing.peers.keys().next().copied();

        let handed = {
            let mut registry = self.registry.write();
            if registry.coordinator == Some(peer) {
                registry.coordinator = lowest;
                if let Some(next) = lowest {
                    tracing::info!("Peer {} is the new session coordinator", next);
                }
            }

            // Explicit claims by the departing peer fall back to the coordinator.
            let before = registry.owners.len();
            registry.owners.retain(|_, owner| *owner != peer);
            before - registry.owners.len()
        };

        let routing = &mut *routing;
        for sender in routing.peers.values() {
            if sender.send(NetEvent::PeerLeft(peer)).is_err() {
                routing.stats.packets_dropped += 1;
            }
        }

        tracing::info!(
            "Peer {} left ({} objects handed over, {} connected)",
            peer,
            handed,
            routing.peers.len()
        );
        true
    }
}

/// In-process replication session.
#[derive(Clone)]
pub struct LoopbackHub {
    shared: Arc<HubShared>,
}

impl LoopbackHub {
    /// Creates a hub with instant delivery.
    #[must_use]
    pub fn new() -> Self {
        Self::with_conditions(NetworkConditions::PERFECT, 1)
    }

    /// Creates a hub that delays packets according to `conditions`.
    #[must_use]
    pub fn with_conditions(conditions: NetworkConditions, seed: u64) -> Self {
        Self {
            shared: Arc::new(HubShared {
                registry: RwLock::new(Registry {
                    owners: HashMap::new(),
                    epochs: HashMap::new(),
                    coordinator: None,
                }),
                routing: Mutex::new(Routing {
                    peers: BTreeMap::new(),
                    latest: HashMap::new(),
                    in_flight: Vec::new(),
                    next_peer: 1,
                    next_order: 0,
                    now: 0,
                    conditions,
                    rng: SimpleRng::new(seed),
                    stats: HubStats::default(),
                }),
            }),
        }
    }

    /// Joins a new peer.
    ///
    /// The newcomer immediately receives the latest snapshot of every object,
    /// then `PeerLeft` for every departed peer whose last word was "moving".
    #[must_use]
    pub fn connect(&self) -> (LoopbackLink, Receiver<NetEvent>) {
        let (tx, rx) = unbounded();
        let mut routing = self.shared.routing.lock();

        let peer = routing.next_peer;
        routing.next_peer += 1;

        for sender in routing.peers.values() {
            // A closed inbound only means that peer stopped listening.
            let _ = sender.send(NetEvent::PeerJoined(peer));
        }
        let mut departed = BTreeSet::new();
        for snapshot in routing.latest.values() {
            let _ = tx.send(NetEvent::Snapshot(*snapshot));
            if snapshot.moving && !routing.peers.contains_key(&snapshot.owner) {
                departed.insert(snapshot.owner);
            }
        }
        for owner in departed {
            let _ = tx.send(NetEvent::PeerLeft(owner));
        }
        routing.peers.insert(peer, tx);

        {
            let mut registry = self.shared.registry.write();
            if registry.coordinator.is_none() {
                registry.coordinator = Some(peer);
                tracing::info!("Peer {} is the session coordinator", peer);
            }
        }

        tracing::info!("Peer {} joined ({} connected)", peer, routing.peers.len());
        let link = LoopbackLink {
            peer,
            shared: Arc::clone(&self.shared),
        };
        (link, rx)
    }

    /// Removes a peer, hands its objects to the coordinator and notifies
    /// everyone else. Returns false if the peer was not connected.
    pub fn disconnect(&self, peer: PeerId) -> bool {
        self.shared.disconnect(peer)
    }

    /// Advances hub time by one tick and delivers every packet now due.
    ///
    /// Returns the number of packets released.
    pub fn advance(&self) -> usize {
        let mut routing = self.shared.routing.lock();
        routing.now += 1;
        let now = routing.now;

        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut routing.in_flight)
            .into_iter()
            .partition(|packet| packet.deliver_at <= now);
        routing.in_flight = waiting;
        due.sort_by_key(|packet| (packet.deliver_at, packet.order));

        let routing = &mut *routing;
        for packet in &due {
            match routing.peers.get(&packet.to) {
                Some(sender) => Routing::deliver(sender, &packet.bytes, &mut routing.stats),
                None => routing.stats.packets_dropped += 1,
            }
        }
        due.len()
    }

    /// Current coordinator.
    #[must_use]
    pub fn coordinator(&self) -> Option<PeerId> {
        self.shared.registry.read().coordinator
    }

    /// Owner of record of `object`.
    #[must_use]
    pub fn owner_of(&self, object: ObjectId) -> Option<PeerId> {
        self.shared.registry.read().owner_of(object)
    }

    /// Current ownership epoch of `object`.
    #[must_use]
    pub fn ownership_epoch(&self, object: ObjectId) -> OwnershipEpoch {
        self.shared.registry.read().epoch_of(object)
    }

    /// Connected peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.shared.routing.lock().peers.len()
    }

    /// Packets waiting for delivery.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.routing.lock().in_flight.len()
    }

    /// Hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        self.shared.routing.lock().stats
    }
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One peer's handle on a [`LoopbackHub`].
pub struct LoopbackLink {
    peer: PeerId,
    shared: Arc<HubShared>,
}

impl LoopbackLink {
    /// Leaves the session.
    pub fn disconnect(&self) -> bool {
        self.shared.disconnect(self.peer)
    }

    /// Returns true while the peer is in the session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected(self.peer)
    }
}

impl ReplicationLink for LoopbackLink {
    fn local_peer(&self) -> PeerId {
        self.peer
    }

    fn request_ownership(&self, object: ObjectId) -> bool {
        if !self.is_connected() {
            return false;
        }
        let (previous, epoch) = {
            let mut registry = self.shared.registry.write();
            let previous = registry.owner_of(object);
            (previous, registry.grant(object, self.peer))
        };
        if previous != Some(self.peer) {
            tracing::debug!(
                "Peer {} took ownership of object {} from {:?} (epoch {})",
                self.peer,
                object,
                previous,
                epoch
            );
        }
        true
    }

    fn ownership_epoch(&self, object: ObjectId) -> OwnershipEpoch {
        self.shared.registry.read().epoch_of(object)
    }

    fn owner_of(&self, object: ObjectId) -> Option<PeerId> {
        self.shared.registry.read().owner_of(object)
    }

    fn publish(&self, snapshot: &PoseSnapshot) -> Result<(), TransportError> {
        let mut routing = self.shared.routing.lock();
        if !routing.peers.contains_key(&self.peer) {
            return Err(TransportError::Disconnected(self.peer));
        }
        if self.shared.registry.read().owner_of(snapshot.object) != Some(self.peer) {
            routing.stats.rejected_publishes += 1;
            tracing::warn!(
                "Peer {} tried to publish object {} without owning it",
                self.peer,
                snapshot.object
            );
            return Err(TransportError::NotOwner {
                object: snapshot.object,
                peer: self.peer,
            });
        }

        routing.record_latest(*snapshot);
        routing.stats.packets_sent += 1;
        routing.broadcast(self.peer, snapshot.encode());
        Ok(())
    }
}
