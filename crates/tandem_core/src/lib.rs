//! # TANDEM Core
//!
//! The per-frame update broker.
//!
//! Every simulation tick the broker invokes the fast callback of every
//! registered fast subscriber and the slow callback of exactly one slow
//! subscriber, in round-robin order. It knows nothing about what the
//! subscribers do.
//!
//! ## Architecture Rules
//!
//! 1. **Non-owning handles** - the broker holds weak references only
//! 2. **Buffered mutation** - registrations requested mid-tick apply after the tick
//! 3. **Fault isolation** - one failing subscriber never starves the others
//!
//! ## Example
//!
//! ```rust,ignore
//! use tandem_core::{UpdateBroker, BrokerConfig, Scheduler};
//!
//! let mut broker = UpdateBroker::new(BrokerConfig::default());
//! let key = broker.attach(&ticker);
//! broker.register_fast(key)?;
//! broker.tick(1.0 / 60.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod broker;
pub mod error;
pub mod memory;

pub use broker::{
    BrokerCommand, BrokerConfig, BrokerStats, Scheduler, SubscriberKey, TickContext, TickTier,
    Ticker, UpdateBroker, DEFAULT_TIER_CAPACITY,
};
pub use error::{BrokerError, BrokerResult, TickError, TickResult};
pub use memory::{SlotArena, SlotKey};
