//! # Memory Management
//!
//! Slot storage with generation-checked keys.
//!
//! A key handed out by [`SlotArena`] stays cheap to copy and compare, and
//! can always be checked for staleness: once its slot is freed the
//! generation moves on and the old key no longer resolves.

pub mod slots;

pub use slots::{SlotArena, SlotKey};
