//! # Update Broker
//!
//! One real dispatch loop multiplexing many logical tickers.
//!
//! ## Tiers
//!
//! ```text
//! tick N:   fast[0] fast[1] ... fast[n-1]   slow[cursor]
//! tick N+1: fast[0] fast[1] ... fast[n-1]   slow[cursor+1]
//! ```
//!
//! - **Fast**: every registered subscriber runs every tick.
//! - **Slow**: exactly one subscriber runs per tick, round-robin.
//!
//! Objects register only while they have per-tick work, so the frame cost is
//! proportional to the *active* objects, not to every object in the world.
//!
//! ## Handles
//!
//! The broker never owns a ticker. [`UpdateBroker::attach`] stores a weak
//! reference and hands back a generation-checked [`SubscriberKey`]. When the
//! ticker is dropped its key stops resolving; the broker skips it and prunes
//! it from both tiers at the end of the tick.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut broker = UpdateBroker::new(BrokerConfig::default());
//! let ticker = Arc::new(Mutex::new(MyTicker::default()));
//! let key = broker.attach(&ticker);
//! broker.register_fast(key)?;
//!
//! loop {
//!     broker.tick(dt);
//! }
//! ```

mod context;
mod registry;

pub use context::{BrokerCommand, TickContext};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, BrokerResult, TickResult};
use crate::memory::{SlotArena, SlotKey};
use registry::TierList;

/// Default soft capacity of each tier.
pub const DEFAULT_TIER_CAPACITY: usize = 1000;

/// Handle to a ticker attached to a broker.
pub type SubscriberKey = SlotKey;

/// Process-wide identity source behind [`UpdateBroker::next_id`].
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The two dispatch tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TickTier {
    /// Every subscriber, every tick.
    Fast,
    /// One subscriber per tick, round-robin.
    Slow,
}

impl fmt::Display for TickTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Slow => write!(f, "slow"),
        }
    }
}

/// A logical ticker driven by the broker.
///
/// Both callbacks default to doing nothing, so a subscriber only implements
/// the tier it uses. A returned error is logged and does not stop the other
/// subscribers of the same tick.
pub trait Ticker: Send {
    /// Called every tick while registered on the fast tier.
    fn on_fast_tick(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
        Ok(())
    }

    /// Called once per rotation while registered on the slow tier.
    fn on_slow_tick(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
        Ok(())
    }
}

/// Registration surface shared by the broker and the tick context.
///
/// Code that (de)registers itself is written once against this trait and
/// works both from input/network handlers (direct) and from inside a tick
/// callback (buffered).
///
/// Inside a tick the result describes the queued change only. A request that
/// later hits the soft capacity or a stale handle is dropped and logged when
/// the queue is applied; capacity drops are counted in
/// [`BrokerStats::rejected_registrations`].
pub trait Scheduler {
    /// Adds `key` to the fast tier. `Ok(false)` if already present.
    ///
    /// # Errors
    ///
    /// [`BrokerError::CapacityExceeded`] at the soft limit,
    /// [`BrokerError::StaleHandle`] for a detached key.
    fn register_fast(&mut self, key: SubscriberKey) -> BrokerResult<bool>;

    /// Removes `key` from the fast tier. Returns false if it was absent.
    fn unregister_fast(&mut self, key: SubscriberKey) -> bool;

    /// Adds `key` to the slow tier. `Ok(false)` if already present.
    ///
    /// # Errors
    ///
    /// Same as [`Scheduler::register_fast`].
    fn register_slow(&mut self, key: SubscriberKey) -> BrokerResult<bool>;

    /// Removes `key` from the slow tier. Returns false if it was absent.
    fn unregister_slow(&mut self, key: SubscriberKey) -> bool;
}

/// Broker configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Soft limit of the fast tier (`None` = unbounded).
    pub fast_capacity: Option<usize>,
    /// Soft limit of the slow tier (`None` = unbounded).
    pub slow_capacity: Option<usize>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            fast_capacity: Some(DEFAULT_TIER_CAPACITY),
            slow_capacity: Some(DEFAULT_TIER_CAPACITY),
        }
    }
}

/// Broker statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Fast callbacks invoked.
    pub fast_invocations: u64,
    /// Slow callbacks invoked.
    pub slow_invocations: u64,
    /// Callbacks that returned an error.
    pub failed_callbacks: u64,
    /// Callbacks skipped because the ticker was locked elsewhere.
    pub busy_skips: u64,
    /// Dead handles removed from the tiers.
    pub pruned: u64,
    /// Registrations dropped at the soft capacity.
    pub rejected_registrations: u64,
}

type TickerRef = Weak<Mutex<dyn Ticker>>;

/// The per-frame update broker.
pub struct UpdateBroker {
    tickers: SlotArena<TickerRef>,
    fast: TierList,
    slow: TierList,
    /// Commands queued by callbacks during the current tick.
    pending: Vec<BrokerCommand>,
    /// Dead handles found during the current tick.
    dead: Vec<SubscriberKey>,
    /// Reused snapshot of the fast tier.
    scratch: Vec<SubscriberKey>,
    clock: f64,
    tick_count: u64,
    stats: BrokerStats,
}

impl UpdateBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            tickers: SlotArena::new(),
            fast: TierList::new(TickTier::Fast, config.fast_capacity),
            slow: TierList::new(TickTier::Slow, config.slow_capacity),
            pending: Vec::new(),
            dead: Vec::new(),
            scratch: Vec::new(),
            clock: 0.0,
            tick_count: 0,
            stats: BrokerStats::default(),
        }
    }

    /// Attaches a ticker and returns its key. The broker keeps only a weak
    /// reference; the ticker is not registered on any tier yet.
    pub fn attach<T: Ticker + 'static>(&mut self, ticker: &Arc<Mutex<T>>) -> SubscriberKey {
        let strong: Arc<Mutex<dyn Ticker>> = ticker.clone();
        self.tickers.insert(Arc::downgrade(&strong))
    }

    /// Detaches `key` and removes it from both tiers.
    ///
    /// Returns false if the key was already stale.
    pub fn detach(&mut self, key: SubscriberKey) -> bool {
        self.fast.remove(key);
        self.slow.remove(key);
        self.tickers.remove(key).is_some()
    }

    /// Returns true if `key` refers to a live, attached ticker.
    #[must_use]
    pub fn is_valid(&self, key: SubscriberKey) -> bool {
        self.tickers
            .get(key)
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Returns a process-unique, monotonically increasing id.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs one frame: the whole fast tier, then one slow subscriber.
    pub fn tick(&mut self, dt: f32) {
        self.clock += f64::from(dt);
        self.tick_count += 1;
        self.stats.ticks += 1;

        let mut pending = std::mem::take(&mut self.pending);
        let mut dead = std::mem::take(&mut self.dead);

        // Membership is fixed at the start of the tick.
        let mut fast_keys = std::mem::take(&mut self.scratch);
        fast_keys.clear();
        fast_keys.extend(self.fast.iter());

        for &key in &fast_keys {
            self.dispatch(key, TickTier::Fast, dt, &mut pending, &mut dead);
        }
        self.scratch = fast_keys;

        if let Some(key) = self.slow.next_in_rotation() {
            self.dispatch(key, TickTier::Slow, dt, &mut pending, &mut dead);
        }

        for command in pending.drain(..) {
            self.apply(command);
        }
        for key in dead.drain(..) {
            self.prune(key);
        }

        self.pending = pending;
        self.dead = dead;
    }

    fn dispatch(
        &mut self,
        key: SubscriberKey,
        tier: TickTier,
        dt: f32,
        pending: &mut Vec<BrokerCommand>,
        dead: &mut Vec<SubscriberKey>,
    ) {
        let Some(ticker) = self.tickers.get(key).and_then(Weak::upgrade) else {
            if !dead.contains(&key) {
                dead.push(key);
            }
            return;
        };

        let Some(mut guard) = ticker.try_lock() else {
            self.stats.busy_skips += 1;
            tracing::warn!("Subscriber {} is busy, skipping {} tick", key, tier);
            return;
        };

        let mut ctx = TickContext::new(
            key,
            (dt, self.clock, self.tick_count),
            (&self.fast, &self.slow),
            pending,
        );
        let result = match tier {
            TickTier::Fast => {
                self.stats.fast_invocations += 1;
                guard.on_fast_tick(&mut ctx)
            }
            TickTier::Slow => {
                self.stats.slow_invocations += 1;
                guard.on_slow_tick(&mut ctx)
            }
        };

        if let Err(err) = result {
            self.stats.failed_callbacks += 1;
            tracing::warn!("Subscriber {} failed during {} tick: {}", key, tier, err);
        }
    }

    fn apply(&mut self, command: BrokerCommand) {
        // Outcomes are logged inside register/unregister.
        match command {
            BrokerCommand::Register(TickTier::Fast, key) => {
                let _ = self.register_fast(key);
            }
            BrokerCommand::Register(TickTier::Slow, key) => {
                let _ = self.register_slow(key);
            }
            BrokerCommand::Unregister(TickTier::Fast, key) => {
                self.unregister_fast(key);
            }
            BrokerCommand::Unregister(TickTier::Slow, key) => {
                self.unregister_slow(key);
            }
        }
    }

    fn prune(&mut self, key: SubscriberKey) {
        self.fast.remove(key);
        self.slow.remove(key);
        self.tickers.remove(key);
        self.stats.pruned += 1;
        tracing::debug!("Pruned dead subscriber {}", key);
    }

    fn register(&mut self, tier: TickTier, key: SubscriberKey) -> BrokerResult<bool> {
        if !self.tickers.contains(key) {
            tracing::warn!("Refusing {} registration of stale handle {}", tier, key);
            return Err(BrokerError::StaleHandle(key));
        }

        let list = match tier {
            TickTier::Fast => &mut self.fast,
            TickTier::Slow => &mut self.slow,
        };
        let result = list.insert(key);
        if let Err(err) = result {
            self.stats.rejected_registrations += 1;
            tracing::warn!("Dropping registration of {}: {}", key, err);
        }
        result
    }

    /// Current broker clock in seconds.
    #[must_use]
    pub const fn clock(&self) -> f64 {
        self.clock
    }

    /// Ticks executed so far.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Number of fast subscribers.
    #[must_use]
    pub fn fast_count(&self) -> usize {
        self.fast.len()
    }

    /// Number of slow subscribers.
    #[must_use]
    pub fn slow_count(&self) -> usize {
        self.slow.len()
    }

    /// Position of the slow-tier rotation.
    #[must_use]
    pub const fn slow_cursor(&self) -> usize {
        self.slow.cursor()
    }

    /// Returns true if `key` is on the fast tier.
    #[must_use]
    pub fn is_fast_registered(&self, key: SubscriberKey) -> bool {
        self.fast.contains(key)
    }

    /// Returns true if `key` is on the slow tier.
    #[must_use]
    pub fn is_slow_registered(&self, key: SubscriberKey) -> bool {
        self.slow.contains(key)
    }

    /// Returns broker statistics.
    #[must_use]
    pub const fn stats(&self) -> &BrokerStats {
        &self.stats
    }
}

impl Default for UpdateBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl Scheduler for UpdateBroker {
    fn register_fast(&mut self, key: SubscriberKey) -> BrokerResult<bool> {
        self.register(TickTier::Fast, key)
    }

    fn unregister_fast(&mut self, key: SubscriberKey) -> bool {
        self.fast.remove(key)
    }

    fn register_slow(&mut self, key: SubscriberKey) -> BrokerResult<bool> {
        self.register(TickTier::Slow, key)
    }

    fn unregister_slow(&mut self, key: SubscriberKey) -> bool {
        self.slow.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every callback into a shared log.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<(&'static str, TickTier)>>>,
        fail: bool,
    }

    impl Ticker for Recorder {
        fn on_fast_tick(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
            self.log.lock().push((self.name, TickTier::Fast));
            if self.fail {
                return Err("recorder failure".into());
            }
            Ok(())
        }

        fn on_slow_tick(&mut self, _ctx: &mut TickContext<'_>) -> TickResult {
            self.log.lock().push((self.name, TickTier::Slow));
            Ok(())
        }
    }

    type Log = Arc<Mutex<Vec<(&'static str, TickTier)>>>;

    fn recorder(name: &'static str, log: &Log) -> Arc<Mutex<Recorder>> {
        Arc::new(Mutex::new(Recorder { name, log: Arc::clone(log), fail: false }))
    }

    fn drain(log: &Log) -> Vec<(&'static str, TickTier)> {
        std::mem::take(&mut *log.lock())
    }

    #[test]
    fn test_fast_tier_runs_every_tick() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        let ka = broker.attach(&a);
        let kb = broker.attach(&b);
        broker.register_fast(ka).unwrap();
        broker.register_fast(kb).unwrap();

        broker.tick(0.016);
        broker.tick(0.016);

        let calls = drain(&log);
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(_, tier)| *tier == TickTier::Fast));
        assert_eq!(broker.tick_count(), 2);
    }

    #[test]
    fn test_register_twice_is_idempotent() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let a = recorder("a", &log);
        let key = broker.attach(&a);

        assert_eq!(broker.register_fast(key), Ok(true));
        assert_eq!(broker.register_fast(key), Ok(false));
        assert_eq!(broker.fast_count(), 1);
        assert_eq!(broker.register_slow(key), Ok(true));
        assert_eq!(broker.register_slow(key), Ok(false));
        assert_eq!(broker.slow_count(), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let a = recorder("a", &log);
        let key = broker.attach(&a);

        assert!(!broker.unregister_fast(key));
        assert!(!broker.unregister_slow(key));
    }

    #[test]
    fn test_capacity_rejection_is_soft() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::new(BrokerConfig {
            fast_capacity: Some(1),
            slow_capacity: None,
        });
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        let ka = broker.attach(&a);
        let kb = broker.attach(&b);

        broker.register_fast(ka).unwrap();
        let err = broker.register_fast(kb).unwrap_err();
        assert_eq!(err, BrokerError::CapacityExceeded { tier: TickTier::Fast, capacity: 1 });
        assert_eq!(broker.stats().rejected_registrations, 1);

        // The accepted subscriber keeps running.
        broker.tick(0.016);
        assert_eq!(drain(&log), vec![("a", TickTier::Fast)]);
    }

    #[test]
    fn test_slow_round_robin() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let recorders: Vec<_> = ["a", "b", "c"].into_iter().map(|n| recorder(n, &log)).collect();
        for p in &recorders {
            let key = broker.attach(p);
            broker.register_slow(key).unwrap();
        }

        for _ in 0..6 {
            broker.tick(0.016);
        }

        let names: Vec<_> = drain(&log).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let bad = Arc::new(Mutex::new(Recorder { name: "bad", log: Arc::clone(&log), fail: true }));
        let good = recorder("good", &log);
        let slow = recorder("slow", &log);

        let kbad = broker.attach(&bad);
        let kgood = broker.attach(&good);
        let kslow = broker.attach(&slow);
        broker.register_fast(kbad).unwrap();
        broker.register_fast(kgood).unwrap();
        broker.register_slow(kslow).unwrap();

        broker.tick(0.016);

        let calls = drain(&log);
        assert!(calls.contains(&("bad", TickTier::Fast)));
        assert!(calls.contains(&("good", TickTier::Fast)));
        assert!(calls.contains(&("slow", TickTier::Slow)));
        assert_eq!(broker.stats().failed_callbacks, 1);
    }

    #[test]
    fn test_dropped_ticker_is_pruned() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let a = recorder("a", &log);
        let key = broker.attach(&a);
        broker.register_fast(key).unwrap();
        broker.register_slow(key).unwrap();

        drop(a);
        assert!(!broker.is_valid(key));

        broker.tick(0.016);
        assert!(drain(&log).is_empty());
        assert_eq!(broker.fast_count(), 0);
        assert_eq!(broker.slow_count(), 0);
        assert_eq!(broker.stats().pruned, 1);
        assert_eq!(broker.register_fast(key), Err(BrokerError::StaleHandle(key)));
    }

    #[test]
    fn test_detach_invalidates_key() {
        let log: Log = Arc::default();
        let mut broker = UpdateBroker::default();
        let a = recorder("a", &log);
        let key = broker.attach(&a);
        broker.register_fast(key).unwrap();

        assert!(broker.detach(key));
        assert!(!broker.detach(key));
        assert_eq!(broker.fast_count(), 0);
        assert_eq!(broker.register_slow(key), Err(BrokerError::StaleHandle(key)));
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let broker = UpdateBroker::default();
        let first = broker.next_id();
        let second = broker.next_id();
        assert!(second > first);
    }
}
