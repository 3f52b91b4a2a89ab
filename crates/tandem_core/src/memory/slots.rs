//! # Slot Arena
//!
//! Growable slot storage addressed by generation-checked keys.

use std::fmt;

/// Key into a [`SlotArena`].
///
/// The key is split into two parts:
/// - Lower 32 bits: Index of the slot
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotKey(u64);

impl SlotKey {
    /// Creates a key from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the key.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the key.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null key. Never resolves.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this key is the null key.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for SlotKey {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}v{}", self.index(), self.generation())
        }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Growable arena with O(1) insert, remove and lookup.
///
/// Freed slots are recycled, but their generation is bumped first, so a key
/// to the previous occupant never aliases the new one.
pub struct SlotArena<T> {
    /// The storage array.
    slots: Vec<Slot<T>>,
    /// Free list - indices of available slots.
    free_list: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` values before reallocating.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no slot is occupied.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores a value and returns its key.
    pub fn insert(&mut self, value: T) -> SlotKey {
        self.len += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return SlotKey::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        SlotKey::new(index, 0)
    }

    /// Removes the value behind `key`.
    ///
    /// Returns `None` if the key is stale or was never issued.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }

        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(key.index());
        self.len -= 1;

        Some(value)
    }

    /// Returns true if `key` still resolves.
    #[inline]
    #[must_use]
    pub fn contains(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Gets a reference to the value behind `key`.
    #[inline]
    #[must_use]
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        let slot = self.slots.get(key.index() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_ref()
    }
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        let key = SlotKey::new(12345, 67890);
        assert_eq!(key.index(), 12345);
        assert_eq!(key.generation(), 67890);
        assert!(!key.is_null());
        assert!(SlotKey::default().is_null());
    }

    #[test]
    fn test_insert_remove() {
        let mut arena = SlotArena::new();

        let k1 = arena.insert(42u32);
        assert_eq!(arena.get(k1), Some(&42));
        assert_eq!(arena.len(), 1);

        assert_eq!(arena.remove(k1), Some(42));
        assert!(arena.is_empty());
        assert_eq!(arena.remove(k1), None);
    }

    #[test]
    fn test_stale_key_after_reuse() {
        let mut arena = SlotArena::with_capacity(2);

        let k1 = arena.insert(1u32);
        arena.remove(k1);

        let k2 = arena.insert(2u32);
        assert_eq!(k1.index(), k2.index()); // Same slot reused
        assert_ne!(k1, k2);
        assert!(arena.get(k1).is_none());
        assert_eq!(arena.get(k2), Some(&2));
    }
}
