//! # Tier Registry
//!
//! Ordered subscriber set for one tick tier.

use indexmap::IndexSet;

use super::{SubscriberKey, TickTier};
use crate::error::{BrokerError, BrokerResult};

/// Subscriber list for one tier, with an optional soft capacity and the
/// round-robin cursor used by the slow tier.
#[derive(Debug)]
pub(crate) struct TierList {
    tier: TickTier,
    members: IndexSet<SubscriberKey>,
    capacity: Option<usize>,
    cursor: usize,
}

impl TierList {
    pub(crate) fn new(tier: TickTier, capacity: Option<usize>) -> Self {
        let initial = capacity.unwrap_or(64).min(1024);
        Self {
            tier,
            members: IndexSet::with_capacity(initial),
            capacity,
            cursor: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub(crate) fn contains(&self, key: SubscriberKey) -> bool {
        self.members.contains(&key)
    }

    #[inline]
    pub(crate) const fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = SubscriberKey> + '_ {
        self.members.iter().copied()
    }

    /// Adds `key`. `Ok(false)` if it was already present.
    pub(crate) fn insert(&mut self, key: SubscriberKey) -> BrokerResult<bool> {
        if self.members.contains(&key) {
            return Ok(false);
        }
        if let Some(capacity) = self.capacity {
            if self.members.len() >= capacity {
                return Err(BrokerError::CapacityExceeded {
                    tier: self.tier,
                    capacity,
                });
            }
        }
        self.members.insert(key);
        Ok(true)
    }

    /// Removes `key`. Returns false if it was not present.
    ///
    /// The fast tier does not care about order and swap-removes. The slow
    /// tier keeps the rotation order and pulls the cursor back when an
    /// earlier entry disappears, so the next subscriber in line still runs next.
    pub(crate) fn remove(&mut self, key: SubscriberKey) -> bool {
        let removed = match self.tier {
            TickTier::Fast => self.members.swap_remove_full(&key),
            TickTier::Slow => self.members.shift_remove_full(&key),
        };
        let Some((index, _)) = removed else {
            return false;
        };

        if index < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.members.len() {
            self.cursor = 0;
        }
        true
    }

    /// Returns the subscriber whose turn it is and advances the cursor.
    pub(crate) fn next_in_rotation(&mut self) -> Option<SubscriberKey> {
        if self.members.is_empty() {
            self.cursor = 0;
            return None;
        }
        if self.cursor >= self.members.len() {
            self.cursor = 0;
        }

        let key = self.members.get_index(self.cursor).copied();
        self.cursor += 1;
        if self.cursor >= self.members.len() {
            self.cursor = 0;
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(i: u32) -> SubscriberKey {
        SubscriberKey::new(i, 0)
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut list = TierList::new(TickTier::Fast, None);
        assert_eq!(list.insert(key(1)), Ok(true));
        assert_eq!(list.insert(key(1)), Ok(false));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut list = TierList::new(TickTier::Slow, Some(2));
        list.insert(key(1)).unwrap();
        list.insert(key(2)).unwrap();
        assert_eq!(
            list.insert(key(3)),
            Err(BrokerError::CapacityExceeded { tier: TickTier::Slow, capacity: 2 })
        );
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_rotation_wraps() {
        let mut list = TierList::new(TickTier::Slow, None);
        for i in 0..3 {
            list.insert(key(i)).unwrap();
        }
        let order: Vec<_> = (0..6).filter_map(|_| list.next_in_rotation()).collect();
        assert_eq!(order, vec![key(0), key(1), key(2), key(0), key(1), key(2)]);
    }

    #[test]
    fn test_slow_removal_keeps_next_in_line() {
        let mut list = TierList::new(TickTier::Slow, None);
        for i in 0..4 {
            list.insert(key(i)).unwrap();
        }
        assert_eq!(list.next_in_rotation(), Some(key(0)));
        assert_eq!(list.next_in_rotation(), Some(key(1)));

        // key(2) is next; removing an earlier entry must not skip it.
        assert!(list.remove(key(0)));
        assert_eq!(list.next_in_rotation(), Some(key(2)));
        assert_eq!(list.next_in_rotation(), Some(key(3)));
        assert_eq!(list.next_in_rotation(), Some(key(1)));
    }

    #[test]
    fn test_cursor_resets_when_emptied() {
        let mut list = TierList::new(TickTier::Slow, None);
        list.insert(key(7)).unwrap();
        list.insert(key(8)).unwrap();
        assert_eq!(list.next_in_rotation(), Some(key(7)));
        assert_eq!(list.cursor(), 1);

        assert!(list.remove(key(8)));
        assert_eq!(list.cursor(), 0);
        assert!(list.remove(key(7)));
        assert_eq!(list.cursor(), 0);
        assert_eq!(list.next_in_rotation(), None);
        assert!(!list.remove(key(7)));
    }
}
