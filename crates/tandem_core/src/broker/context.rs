//! # Tick Context
//!
//! Handed to every subscriber callback. Structural changes requested through
//! it are buffered and applied once the broker has finished iterating.

use super::registry::TierList;
use super::{Scheduler, SubscriberKey, TickTier};
use crate::error::BrokerResult;

/// A registration change requested during a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BrokerCommand {
    /// Add `key` to `tier`.
    Register(TickTier, SubscriberKey),
    /// Remove `key` from `tier`.
    Unregister(TickTier, SubscriberKey),
}

/// Per-callback view of the running tick.
pub struct TickContext<'a> {
    key: SubscriberKey,
    dt: f32,
    now: f64,
    tick: u64,
    fast: &'a TierList,
    slow: &'a TierList,
    pending: &'a mut Vec<BrokerCommand>,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(
        key: SubscriberKey,
        (dt, now, tick): (f32, f64, u64),
        (fast, slow): (&'a TierList, &'a TierList),
        pending: &'a mut Vec<BrokerCommand>,
    ) -> Self {
        Self { key, dt, now, tick, fast, slow, pending }
    }

    /// Key of the subscriber being ticked.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> SubscriberKey {
        self.key
    }

    /// Seconds elapsed since the previous tick.
    #[inline]
    #[must_use]
    pub const fn dt(&self) -> f32 {
        self.dt
    }

    /// Broker clock in seconds, including this tick.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Number of this tick, starting at 1.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Commands queued so far in this tick.
    #[must_use]
    pub fn pending(&self) -> &[BrokerCommand] {
        self.pending.as_slice()
    }

    /// Membership of `key` on `tier` once the queued commands are applied.
    fn member_after_queue(&self, tier: TickTier, key: SubscriberKey) -> bool {
        let list = match tier {
            TickTier::Fast => self.fast,
            TickTier::Slow => self.slow,
        };
        self.pending
            .iter()
            .fold(list.contains(key), |member, command| match *command {
                BrokerCommand::Register(t, k) if t == tier && k == key => true,
                BrokerCommand::Unregister(t, k) if t == tier && k == key => false,
                _ => member,
            })
    }

    fn queue_register(&mut self, tier: TickTier, key: SubscriberKey) -> bool {
        if self.member_after_queue(tier, key) {
            return false;
        }
        self.pending.push(BrokerCommand::Register(tier, key));
        true
    }

    fn queue_unregister(&mut self, tier: TickTier, key: SubscriberKey) -> bool {
        if !self.member_after_queue(tier, key) {
            return false;
        }
        self.pending.push(BrokerCommand::Unregister(tier, key));
        true
    }
}

/// Requests are queued and judged against the tier as it will look after
/// the queue: `Ok(false)` / `false` for a key that is already (or no longer)
/// there. Capacity and stale-handle rejections are only known when the queue
/// is applied. The broker logs both and counts capacity rejections in
/// [`super::BrokerStats::rejected_registrations`].
impl Scheduler for TickContext<'_> {
    fn register_fast(&mut self, key: SubscriberKey) -> BrokerResult<bool> {
        Ok(self.queue_register(TickTier::Fast, key))
    }

    fn unregister_fast(&mut self, key: SubscriberKey) -> bool {
        self.queue_unregister(TickTier::Fast, key)
    }

    fn register_slow(&mut self, key: SubscriberKey) -> BrokerResult<bool> {
        Ok(self.queue_register(TickTier::Slow, key))
    }

    fn unregister_slow(&mut self, key: SubscriberKey) -> bool {
        self.queue_unregister(TickTier::Slow, key)
    }
}
