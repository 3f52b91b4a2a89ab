//! # Synced Movable
//!
//! A shared rigid object that any peer can pick up, with exactly one writer
//! at a time.
//!
//! ## Roles
//!
//! - **Holder** (`LocalAuthoritative`): owns the object, registered on the
//!   fast tier, broadcasts its pose at most `broadcast_rate_hz` times a
//!   second plus one unconditional push on pickup and one on drop.
//! - **Trackers** (`RemoteTracking`): registered on the fast tier only to
//!   smooth their local pose toward the latest snapshot.
//! - **Everyone else** (`AtRest`): not registered at all. An idle object
//!   costs nothing per frame.
//!
//! ## Conflicts
//!
//! Ownership of record always wins. A holder that finds another peer owns
//! the object, either on its own tick or when that peer's snapshot arrives,
//! drops its hold without broadcasting.
//!
//! ## Example
//!
//! ```rust,ignore
//! let movable = Arc::new(Mutex::new(SyncedMovable::new(
//!     object, Pose::IDENTITY, Arc::clone(&link), ColliderFlag::new(), config,
//! )));
//! let key = broker.attach(&movable);
//! movable.lock().bind(key);
//!
//! movable.lock().trigger_hold(&mut broker)?;
//! ```

mod broadcast;
mod state;

pub use broadcast::BroadcastLimiter;
pub use state::{MotionPhase, MovableState};

use std::sync::Arc;

use tandem_core::{Scheduler, SlotKey, SubscriberKey, TickContext, TickResult, Ticker};
use tandem_shared::{snap_pose, Pose, SyncConfig};

use crate::error::{SyncError, SyncResult};
use crate::interpolation::ExponentialSmoother;
use crate::protocol::{serial_after, ObjectId, OrderKey, PeerId, PoseSnapshot, SequenceNumber};
use crate::transport::{CollisionProxy, ReplicationLink};

/// Access check consulted before a pickup.
pub trait PickupGate: Send + Sync {
    /// Returns true if `peer` may pick up `object`.
    fn may_pickup(&self, object: ObjectId, peer: PeerId) -> bool;
}

/// Gate that admits everyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl PickupGate for AllowAll {
    fn may_pickup(&self, _object: ObjectId, _peer: PeerId) -> bool {
        true
    }
}

/// Per-movable counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovableStats {
    /// Successful pickups.
    pub pickups: u64,
    /// Pickups rejected by the gate.
    pub pickups_denied: u64,
    /// Local drops.
    pub drops: u64,
    /// Snapshots published.
    pub broadcasts: u64,
    /// Remote snapshots applied.
    pub snapshots_applied: u64,
    /// Remote snapshots older than the last applied one.
    pub stale_discarded: u64,
    /// Remote snapshots ignored because the local peer owns the object.
    pub superseded: u64,
    /// Times another peer turned out to own a locally held object.
    pub ownership_conflicts: u64,
    /// Local holds released without a broadcast.
    pub forced_releases: u64,
    /// Entries into `SettlingToRest`.
    pub settles: u64,
    /// Smoothing steps taken while tracking.
    pub smoothing_steps: u64,
}

/// One peer's replica of a shared object.
pub struct SyncedMovable<L: ReplicationLink, C: CollisionProxy> {
    object: ObjectId,
    link: Arc<L>,
    collider: C,
    gate: Box<dyn PickupGate>,
    key: SubscriberKey,
    config: SyncConfig,
    smoother: ExponentialSmoother,
    limiter: BroadcastLimiter,
    state: MovableState,
    /// Rendered pose (held pose while authoritative).
    pose: Pose,
    /// Last applied or published snapshot pose.
    target: Pose,
    target_owner: Option<PeerId>,
    last_applied: Option<OrderKey>,
    /// Highest sequence seen or sent for this object.
    sequence: SequenceNumber,
    last_snapshot_at: f64,
    first_snapshot_pending: bool,
    last_broadcast: Option<PoseSnapshot>,
    stats: MovableStats,
}

impl<L: ReplicationLink, C: CollisionProxy> SyncedMovable<L, C> {
    /// Creates an at-rest replica.
    ///
    /// The replica is inert until [`SyncedMovable::bind`] gives it the key
    /// it was attached to the broker with.
    #[must_use]
    pub fn new(object: ObjectId, initial: Pose, link: Arc<L>, collider: C, config: SyncConfig) -> Self {
        Self {
            object,
            link,
            collider,
            gate: Box::new(AllowAll),
            key: SlotKey::NULL,
            smoother: ExponentialSmoother::new(config.smoothing_decay),
            limiter: BroadcastLimiter::from_rate(config.broadcast_rate_hz),
            config,
            state: MovableState::AtRest,
            pose: initial,
            target: initial,
            target_owner: None,
            last_applied: None,
            sequence: 0,
            last_snapshot_at: 0.0,
            first_snapshot_pending: true,
            last_broadcast: None,
            stats: MovableStats::default(),
        }
    }

    /// Replaces the pickup gate.
    #[must_use]
    pub fn with_gate(mut self, gate: impl PickupGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Sets the broker key this replica registers itself with.
    pub fn bind(&mut self, key: SubscriberKey) {
        self.key = key;
    }

    // =========================================================================
    // Input events
    // =========================================================================

    /// Picks the object up on behalf of the local peer.
    ///
    /// A no-op while already held locally.
    ///
    /// # Errors
    ///
    /// [`SyncError::PickupDenied`] or [`SyncError::OwnershipRefused`] leave
    /// the replica untouched. A transport error on the pickup push is
    /// returned after the hold has taken effect.
    pub fn trigger_hold(&mut self, scheduler: &mut dyn Scheduler) -> SyncResult<()> {
        if self.state == MovableState::LocalAuthoritative {
            return Ok(());
        }

        let local = self.link.local_peer();
        if !self.gate.may_pickup(self.object, local) {
            self.stats.pickups_denied += 1;
            tracing::debug!("Peer {} may not pick up object {}", local, self.object);
            return Err(SyncError::PickupDenied { object: self.object, peer: local });
        }
        if !self.link.request_ownership(self.object) {
            tracing::warn!("Ownership of object {} refused for peer {}", self.object, local);
            return Err(SyncError::OwnershipRefused(self.object));
        }

        self.collider.set_collidable(false);
        scheduler.unregister_slow(self.key);
        self.register_fast(scheduler);
        self.limiter.reset();
        self.first_snapshot_pending = false;
        self.transition(MovableState::LocalAuthoritative, "pickup");
        self.stats.pickups += 1;

        // The pickup push skips the rate limit so trackers react at once.
        self.broadcast(true)
    }

    /// Drops a locally held object where it is.
    ///
    /// A no-op unless held locally.
    ///
    /// # Errors
    ///
    /// A transport error on the final push. The local drop has already
    /// taken effect.
    pub fn trigger_release(&mut self, scheduler: &mut dyn Scheduler) -> SyncResult<()> {
        if self.state != MovableState::LocalAuthoritative {
            return Ok(());
        }

        self.leave_authority(scheduler);
        if self.config.snap_enabled {
            // Land where every tracker will pin it.
            self.pose = self.broadcast_pose();
        }
        self.transition(MovableState::AtRest, "drop");
        self.stats.drops += 1;

        self.broadcast(false)
    }

    /// Moves the held object. Returns false unless held locally.
    pub fn set_held_pose(&mut self, pose: Pose) -> bool {
        if self.state != MovableState::LocalAuthoritative {
            return false;
        }
        self.pose = pose;
        true
    }

    // =========================================================================
    // Network events
    // =========================================================================

    /// Applies a replicated snapshot. Returns true if it was applied.
    ///
    /// `now` is the broker clock, used by the liveness timeout.
    pub fn on_snapshot_received(
        &mut self,
        snapshot: &PoseSnapshot,
        scheduler: &mut dyn Scheduler,
        now: f64,
    ) -> bool {
        if snapshot.object != self.object {
            return false;
        }
        if !snapshot.is_newer_than(self.last_applied) {
            self.stats.stale_discarded += 1;
            tracing::trace!(
                "Object {} discarding stale snapshot {}/{} from peer {}",
                self.object,
                snapshot.epoch,
                snapshot.sequence,
                snapshot.owner
            );
            return false;
        }

        if self.state == MovableState::LocalAuthoritative {
            if self.link.is_owner(self.object, self.link.local_peer()) {
                // We still own the object. Outrank the stray writer.
                self.note_sequence(snapshot.sequence);
                self.stats.superseded += 1;
                return false;
            }
            self.stats.ownership_conflicts += 1;
            tracing::warn!(
                "Object {} is held by peer {} too, releasing local hold",
                self.object,
                snapshot.owner
            );
            self.force_release(scheduler, "ownership conflict");
        }

        self.note_sequence(snapshot.sequence);
        self.last_applied = Some(snapshot.order_key());
        self.target = snapshot.pose;
        self.target_owner = Some(snapshot.owner);
        self.last_snapshot_at = now;
        self.stats.snapshots_applied += 1;
        let first = std::mem::replace(&mut self.first_snapshot_pending, false);

        if !snapshot.moving {
            self.pose = snapshot.pose;
            self.release_registrations(scheduler);
            self.transition(MovableState::AtRest, "released by owner");
            return true;
        }

        if first {
            // Never animate in from an arbitrary default pose.
            self.pose = snapshot.pose;
        }
        self.begin_tracking(scheduler);
        true
    }

    /// Reacts to a peer leaving the session.
    ///
    /// If that peer was moving the object, the pose is pinned to its last
    /// snapshot and the replica waits in `SettlingToRest`.
    pub fn on_peer_left(&mut self, peer: PeerId, scheduler: &mut dyn Scheduler) {
        if self.state == MovableState::RemoteTracking && self.target_owner == Some(peer) {
            self.settle(scheduler, "holder left");
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    fn begin_tracking(&mut self, scheduler: &mut dyn Scheduler) {
        if self.state == MovableState::RemoteTracking {
            return;
        }
        self.register_fast(scheduler);
        if self.config.liveness_timeout_secs.is_some() {
            self.register_slow(scheduler);
        }
        self.transition(MovableState::RemoteTracking, "remote hold");
    }

    fn force_release(&mut self, scheduler: &mut dyn Scheduler, reason: &str) {
        self.leave_authority(scheduler);
        self.stats.forced_releases += 1;
        self.transition(MovableState::AtRest, reason);
    }

    fn settle(&mut self, scheduler: &mut dyn Scheduler, reason: &str) {
        self.pose = self.target;
        self.release_registrations(scheduler);
        self.stats.settles += 1;
        self.transition(MovableState::SettlingToRest, reason);
    }

    fn leave_authority(&mut self, scheduler: &mut dyn Scheduler) {
        scheduler.unregister_fast(self.key);
        self.collider.set_collidable(true);
    }

    fn transition(&mut self, next: MovableState, reason: &str) {
        if self.state == next {
            return;
        }
        if self.config.debug_enabled {
            tracing::info!("Object {} {} -> {} ({})", self.object, self.state, next, reason);
        } else {
            tracing::trace!("Object {} {} -> {} ({})", self.object, self.state, next, reason);
        }
        self.state = next;
    }

    fn register_fast(&self, scheduler: &mut dyn Scheduler) {
        if let Err(err) = scheduler.register_fast(self.key) {
            tracing::debug!("Object {} continues without fast ticks: {}", self.object, err);
        }
    }

    fn register_slow(&self, scheduler: &mut dyn Scheduler) {
        if let Err(err) = scheduler.register_slow(self.key) {
            tracing::debug!("Object {} continues without liveness checks: {}", self.object, err);
        }
    }

    fn release_registrations(&self, scheduler: &mut dyn Scheduler) {
        scheduler.unregister_fast(self.key);
        scheduler.unregister_slow(self.key);
    }

    // =========================================================================
    // Broadcasting
    // =========================================================================

    fn broadcast_pose(&self) -> Pose {
        if self.config.snap_enabled {
            snap_pose(self.pose, self.config.position_grid, self.config.angle_step_degrees)
        } else {
            self.pose
        }
    }

    /// Keeps `sequence` at the newest value seen, modulo wraparound.
    fn note_sequence(&mut self, sequence: SequenceNumber) {
        if self.last_applied.is_none() || serial_after(sequence, self.sequence) {
            self.sequence = sequence;
        }
    }

    fn broadcast(&mut self, moving: bool) -> SyncResult<()> {
        let owner = self.link.local_peer();
        let snapshot = PoseSnapshot {
            object: self.object,
            owner,
            epoch: self.link.ownership_epoch(self.object),
            sequence: self.sequence.wrapping_add(1),
            pose: self.broadcast_pose(),
            moving,
        };
        self.link.publish(&snapshot)?;

        self.sequence = snapshot.sequence;
        self.last_applied = Some(snapshot.order_key());
        self.target = snapshot.pose;
        self.target_owner = Some(owner);
        self.last_broadcast = Some(snapshot);
        self.stats.broadcasts += 1;
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Object id.
    #[must_use]
    pub const fn object(&self) -> ObjectId {
        self.object
    }

    /// Broker key this replica is bound to.
    #[must_use]
    pub const fn key(&self) -> SubscriberKey {
        self.key
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> MovableState {
        self.state
    }

    /// Derived motion phase.
    #[must_use]
    pub const fn motion_phase(&self) -> MotionPhase {
        self.state.phase()
    }

    /// True once nobody is moving the object.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.motion_phase() == MotionPhase::Settled
    }

    /// True if the local peer holds the object and is its owner of record.
    #[must_use]
    pub fn is_authoritative_here(&self) -> bool {
        self.state == MovableState::LocalAuthoritative
            && self.link.is_owner(self.object, self.link.local_peer())
    }

    /// True until the first snapshot since joining has been applied.
    #[must_use]
    pub const fn first_snapshot_pending(&self) -> bool {
        self.first_snapshot_pending
    }

    /// Local (rendered) pose.
    #[must_use]
    pub const fn pose(&self) -> Pose {
        self.pose
    }

    /// Pose of the last applied or published snapshot.
    #[must_use]
    pub const fn target(&self) -> Pose {
        self.target
    }

    /// The last snapshot this replica published.
    #[must_use]
    pub const fn last_broadcast(&self) -> Option<PoseSnapshot> {
        self.last_broadcast
    }

    /// The collision proxy.
    #[must_use]
    pub const fn collider(&self) -> &C {
        &self.collider
    }

    /// Counters.
    #[must_use]
    pub const fn stats(&self) -> &MovableStats {
        &self.stats
    }

    /// Whether broadcasts are snapped to the grid.
    #[must_use]
    pub const fn snap_enabled(&self) -> bool {
        self.config.snap_enabled
    }

    /// Enables or disables grid snapping of broadcasts.
    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.config.snap_enabled = enabled;
    }

    /// Whether state transitions are logged at info level.
    #[must_use]
    pub const fn debug_enabled(&self) -> bool {
        self.config.debug_enabled
    }

    /// Raises state transition logs from trace to info.
    pub fn set_debug_enabled(&mut self, enabled: bool) {
        self.config.debug_enabled = enabled;
    }
}

impl<L: ReplicationLink, C: CollisionProxy> Ticker for SyncedMovable<L, C> {
    fn on_fast_tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        match self.state {
            MovableState::LocalAuthoritative => {
                if !self.link.is_owner(self.object, self.link.local_peer()) {
                    self.stats.ownership_conflicts += 1;
                    tracing::warn!("Object {} lost ownership while held", self.object);
                    self.force_release(ctx, "ownership lost");
                    return Ok(());
                }
                if self.limiter.accumulate(ctx.dt()) {
                    self.broadcast(true)?;
                }
            }
            MovableState::RemoteTracking => {
                self.pose = self.smoother.step(self.pose, self.target, ctx.dt());
                self.stats.smoothing_steps += 1;
            }
            MovableState::AtRest | MovableState::SettlingToRest => {
                let key = ctx.key();
                ctx.unregister_fast(key);
            }
        }
        Ok(())
    }

    fn on_slow_tick(&mut self, ctx: &mut TickContext<'_>) -> TickResult {
        match (self.state, self.config.liveness_timeout_secs) {
            (MovableState::RemoteTracking, Some(timeout)) => {
                let silent = ctx.now() - self.last_snapshot_at;
                if silent > f64::from(timeout) {
                    tracing::warn!(
                        "Object {} heard nothing from peer {:?} for {:.2}s, settling",
                        self.object,
                        self.target_owner,
                        silent
                    );
                    self.settle(ctx, "holder went quiet");
                }
            }
            _ => {
                let key = ctx.key();
                ctx.unregister_slow(key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::protocol::OwnershipEpoch;
    use crate::transport::ColliderFlag;
    use parking_lot::Mutex;
    use tandem_core::{BrokerConfig, UpdateBroker};
    use tandem_shared::Vec3;

    /// Single-process link with a settable owner of record.
    struct MockLink {
        peer: PeerId,
        owner: Mutex<Option<PeerId>>,
        epoch: Mutex<OwnershipEpoch>,
        refuse: bool,
        published: Mutex<Vec<PoseSnapshot>>,
    }

    impl MockLink {
        fn new(peer: PeerId) -> Arc<Self> {
            Self::build(peer, false)
        }

        fn refusing(peer: PeerId) -> Arc<Self> {
            Self::build(peer, true)
        }

        fn build(peer: PeerId, refuse: bool) -> Arc<Self> {
            Arc::new(Self {
                peer,
                owner: Mutex::new(None),
                epoch: Mutex::new(0),
                refuse,
                published: Mutex::new(Vec::new()),
            })
        }
    }

    impl ReplicationLink for MockLink {
        fn local_peer(&self) -> PeerId {
            self.peer
        }

        fn request_ownership(&self, _object: ObjectId) -> bool {
            if self.refuse {
                return false;
            }
            *self.owner.lock() = Some(self.peer);
            *self.epoch.lock() += 1;
            true
        }

        fn ownership_epoch(&self, _object: ObjectId) -> OwnershipEpoch {
            *self.epoch.lock()
        }

        fn owner_of(&self, _object: ObjectId) -> Option<PeerId> {
            *self.owner.lock()
        }

        fn publish(&self, snapshot: &PoseSnapshot) -> Result<(), TransportError> {
            if !self.is_owner(snapshot.object, self.peer) {
                return Err(TransportError::NotOwner { object: snapshot.object, peer: self.peer });
            }
            self.published.lock().push(*snapshot);
            Ok(())
        }
    }

    struct DenyAll;

    impl PickupGate for DenyAll {
        fn may_pickup(&self, _object: ObjectId, _peer: PeerId) -> bool {
            false
        }
    }

    type Movable = SyncedMovable<MockLink, ColliderFlag>;

    fn attach(
        broker: &mut UpdateBroker,
        movable: SyncedMovable<MockLink, ColliderFlag>,
    ) -> Arc<Mutex<Movable>> {
        let movable = Arc::new(Mutex::new(movable));
        let key = broker.attach(&movable);
        movable.lock().bind(key);
        movable
    }

    fn setup(config: SyncConfig) -> (UpdateBroker, Arc<MockLink>, Arc<Mutex<Movable>>) {
        let mut broker = UpdateBroker::new(BrokerConfig::default());
        let link = MockLink::new(1);
        let movable = SyncedMovable::new(9, Pose::IDENTITY, Arc::clone(&link), ColliderFlag::new(), config);
        let movable = attach(&mut broker, movable);
        (broker, link, movable)
    }

    fn remote(owner: PeerId, sequence: u32, x: f32, moving: bool) -> PoseSnapshot {
        PoseSnapshot {
            object: 9,
            owner,
            epoch: 1,
            sequence,
            pose: Pose::new(Vec3::new(x, 0.0, 0.0), tandem_shared::Quaternion::IDENTITY),
            moving,
        }
    }

    #[test]
    fn test_pickup_registers_and_pushes_immediately() {
        let (mut broker, link, movable) = setup(SyncConfig::default());
        let mut m = movable.lock();

        m.trigger_hold(&mut broker).unwrap();

        assert_eq!(m.state(), MovableState::LocalAuthoritative);
        assert!(!m.collider().is_collidable());
        assert!(broker.is_fast_registered(m.key()));
        let published = link.published.lock();
        assert_eq!(published.len(), 1);
        assert!(published[0].moving);
        assert_eq!(published[0].sequence, 1);
        assert_eq!(published[0].epoch, 1);
    }

    #[test]
    fn test_hold_twice_is_noop() {
        let (mut broker, link, movable) = setup(SyncConfig::default());
        let mut m = movable.lock();
        m.trigger_hold(&mut broker).unwrap();
        m.trigger_hold(&mut broker).unwrap();
        assert_eq!(m.stats().pickups, 1);
        assert_eq!(link.published.lock().len(), 1);
    }

    #[test]
    fn test_gate_denial_leaves_object_untouched() {
        let mut broker = UpdateBroker::default();
        let link = MockLink::new(1);
        let movable = SyncedMovable::new(9, Pose::IDENTITY, Arc::clone(&link), ColliderFlag::new(), SyncConfig::default())
            .with_gate(DenyAll);
        let movable = attach(&mut broker, movable);
        let mut m = movable.lock();

        let err = m.trigger_hold(&mut broker).unwrap_err();
        assert_eq!(err, SyncError::PickupDenied { object: 9, peer: 1 });
        assert_eq!(m.state(), MovableState::AtRest);
        assert!(m.collider().is_collidable());
        assert_eq!(link.owner_of(9), None);
        assert_eq!(broker.fast_count(), 0);
        assert_eq!(m.stats().pickups_denied, 1);
        assert_eq!(m.collider().toggles(), 0);
    }

    #[test]
    fn test_refused_ownership_leaves_object_untouched() {
        let mut broker = UpdateBroker::default();
        let link = MockLink::refusing(1);
        let movable = SyncedMovable::new(9, Pose::IDENTITY, Arc::clone(&link), ColliderFlag::new(), SyncConfig::default());
        let movable = attach(&mut broker, movable);
        let mut m = movable.lock();

        assert_eq!(m.trigger_hold(&mut broker), Err(SyncError::OwnershipRefused(9)));
        assert_eq!(m.state(), MovableState::AtRest);
        assert!(m.collider().is_collidable());
        assert_eq!(broker.fast_count(), 0);
        assert!(link.published.lock().is_empty());
    }

    #[test]
    fn test_release_pushes_final_snapshot() {
        let (mut broker, link, movable) = setup(SyncConfig::default());
        {
            let mut m = movable.lock();
            m.trigger_hold(&mut broker).unwrap();
            m.set_held_pose(Pose::new(Vec3::new(2.0, 0.0, 0.0), tandem_shared::Quaternion::IDENTITY));
        }
        broker.tick(1.0 / 60.0);

        let mut m = movable.lock();
        m.trigger_release(&mut broker).unwrap();
        assert_eq!(m.state(), MovableState::AtRest);
        assert!(m.is_settled());
        assert!(m.collider().is_collidable());
        assert_eq!(m.collider().toggles(), 2);
        assert!(!broker.is_fast_registered(m.key()));

        let last = *link.published.lock().last().unwrap();
        assert!(!last.moving);
        assert_eq!(last.pose.position, Vec3::new(2.0, 0.0, 0.0));
        // Not holding: release again does nothing.
        m.trigger_release(&mut broker).unwrap();
        assert_eq!(m.stats().drops, 1);
    }

    #[test]
    fn test_ownership_lost_on_tick_forces_release() {
        let (mut broker, link, movable) = setup(SyncConfig::default());
        movable.lock().trigger_hold(&mut broker).unwrap();

        *link.owner.lock() = Some(2);
        broker.tick(1.0 / 60.0);

        let m = movable.lock();
        assert_eq!(m.state(), MovableState::AtRest);
        assert_eq!(m.stats().forced_releases, 1);
        assert!(m.collider().is_collidable());
        assert!(!broker.is_fast_registered(m.key()));
        // No rebroadcast on a forced release.
        assert_eq!(link.published.lock().len(), 1);
    }

    #[test]
    fn test_stale_and_duplicate_snapshots_are_discarded() {
        let (mut broker, _link, movable) = setup(SyncConfig::default());
        let mut m = movable.lock();

        assert!(m.on_snapshot_received(&remote(2, 5, 1.0, true), &mut broker, 0.0));
        assert!(!m.on_snapshot_received(&remote(2, 5, 1.0, true), &mut broker, 0.0));
        assert!(!m.on_snapshot_received(&remote(2, 4, 9.0, false), &mut broker, 0.0));
        assert_eq!(m.stats().stale_discarded, 2);
        assert_eq!(m.state(), MovableState::RemoteTracking);
        assert_eq!(m.target().position.x, 1.0);
    }

    #[test]
    fn test_previous_holder_packets_lose_to_new_epoch() {
        let (mut broker, link, movable) = setup(SyncConfig::default());
        // Peer 2 held the object under epoch 1.
        *link.epoch.lock() = 1;
        let mut m = movable.lock();
        assert!(m.on_snapshot_received(&remote(2, 40, 3.0, true), &mut broker, 0.0));

        m.trigger_hold(&mut broker).unwrap();
        m.set_held_pose(Pose::new(Vec3::new(-5.0, 0.0, 0.0), tandem_shared::Quaternion::IDENTITY));
        // Peer 2 kept sending before it saw the handoff.
        assert!(!m.on_snapshot_received(&remote(2, 45, 3.5, true), &mut broker, 0.0));
        assert_eq!(m.state(), MovableState::LocalAuthoritative);
        assert_eq!(m.stats().ownership_conflicts, 0);

        m.trigger_release(&mut broker).unwrap();
        let last = *link.published.lock().last().unwrap();
        assert_eq!((last.epoch, last.moving), (2, false));
        assert!(last.is_newer_than(Some(remote(2, 50, 4.0, true).order_key())));

        assert!(!m.on_snapshot_received(&remote(2, 50, 4.0, true), &mut broker, 0.0));
        assert_eq!(m.state(), MovableState::AtRest);
        assert_eq!(m.pose().position.x, -5.0);
        assert_eq!(m.stats().stale_discarded, 2);
        assert_eq!(broker.fast_count(), 0);
    }

    #[test]
    fn test_sequence_wraps_around() {
        let (mut broker, link, movable) = setup(SyncConfig::default());
        *link.epoch.lock() = 1;
        let mut m = movable.lock();

        assert!(m.on_snapshot_received(&remote(2, u32::MAX, 1.0, true), &mut broker, 0.0));
        assert!(m.on_snapshot_received(&remote(2, 0, 2.0, true), &mut broker, 0.0));
        assert!(!m.on_snapshot_received(&remote(2, u32::MAX - 1, 9.0, true), &mut broker, 0.0));
        assert_eq!(m.target().position.x, 2.0);

        m.trigger_hold(&mut broker).unwrap();
        assert_eq!(link.published.lock()[0].sequence, 1);
    }

    #[test]
    fn test_first_snapshot_is_hard_set() {
        let (mut broker, _link, movable) = setup(SyncConfig::default());
        let mut m = movable.lock();
        assert!(m.first_snapshot_pending());

        m.on_snapshot_received(&remote(2, 1, 5.0, true), &mut broker, 0.0);
        assert_eq!(m.pose().position.x, 5.0);
        assert!(!m.first_snapshot_pending());

        // Later snapshots only move the target.
        m.on_snapshot_received(&remote(2, 2, 6.0, true), &mut broker, 0.0);
        assert_eq!(m.pose().position.x, 5.0);
        assert_eq!(m.target().position.x, 6.0);
    }

    #[test]
    fn test_liveness_timeout_settles_quiet_holder() {
        let config = SyncConfig { liveness_timeout_secs: Some(0.5), ..SyncConfig::default() };
        let (mut broker, _link, movable) = setup(config);
        movable.lock().on_snapshot_received(&remote(2, 1, 3.0, true), &mut broker, 0.0);
        let key = movable.lock().key();
        assert!(broker.is_slow_registered(key));

        for _ in 0..40 {
            broker.tick(1.0 / 60.0);
        }

        let m = movable.lock();
        assert_eq!(m.state(), MovableState::SettlingToRest);
        assert_eq!(m.motion_phase(), MotionPhase::Releasing);
        assert_eq!(m.pose().position.x, 3.0);
        assert!(!broker.is_fast_registered(key));
        assert!(!broker.is_slow_registered(key));
    }

    #[test]
    fn test_debug_and_snap_flags() {
        let (_broker, _link, movable) = setup(SyncConfig::default());
        let mut m = movable.lock();
        assert!(!m.snap_enabled());
        assert!(!m.debug_enabled());
        m.set_snap_enabled(true);
        m.set_debug_enabled(true);
        assert!(m.snap_enabled());
        assert!(m.debug_enabled());
    }
}
