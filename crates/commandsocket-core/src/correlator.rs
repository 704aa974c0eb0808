//! Request correlation with bounded memory.
//!
//! Two disciplines with observably different overflow behavior:
//!
//! - [`CorrelationRing`] recycles ids through a fixed-size ring. When the
//!   ring wraps, the oldest slot is silently overwritten and a very late
//!   response can resolve against the wrong entry. That is the accepted
//!   trade-off for bounded memory under a misbehaving peer.
//! - [`PendingTable`] uses non-recycled ids and, once it holds more than
//!   its capacity of outstanding entries, drains them all at once
//!   (bulk-reject) before accepting the next one.

use std::collections::HashMap;

/// Fixed-capacity ring of in-flight request slots.
///
/// Ids are the slot indices, so they are unique only within one window of
/// `capacity` registrations.
#[derive(Debug)]
pub struct CorrelationRing<T> {
    slots: Vec<Option<T>>,
    cursor: usize,
}

impl<T> CorrelationRing<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be nonzero");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, cursor: 0 }
    }

    /// Register an entry, returning its correlation id.
    ///
    /// Overwrites whatever occupied the slot; the previous entry, if any,
    /// is dropped without notice.
    pub fn register(&mut self, entry: T) -> u64 {
        let id = self.cursor;
        self.slots[id] = Some(entry);
        self.cursor = (self.cursor + 1) % self.slots.len();
        id as u64
    }

    /// Remove and return the entry for `id`, if the slot is live.
    pub fn take(&mut self, id: u64) -> Option<T> {
        self.slots.get_mut(id as usize).and_then(Option::take)
    }

    /// Drop every outstanding entry. Used on connection reset.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.cursor = 0;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Bounded table of pending continuations keyed by non-recycled ids.
#[derive(Debug)]
pub struct PendingTable<T> {
    capacity: usize,
    entries: HashMap<u64, T>,
}

impl<T> PendingTable<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
        }
    }

    /// Insert a pending entry.
    ///
    /// If the table already holds more than `capacity` entries, every
    /// outstanding one is drained and returned first so the caller can
    /// reject them; the new entry is then inserted into the emptied table.
    pub fn register(&mut self, id: u64, entry: T) -> Vec<T> {
        let evicted = if self.entries.len() > self.capacity {
            self.drain()
        } else {
            Vec::new()
        };
        self.entries.insert(id, entry);
        evicted
    }

    /// Remove and return the entry for `id`. Unknown ids yield `None`.
    pub fn resolve(&mut self, id: u64) -> Option<T> {
        self.entries.remove(&id)
    }

    /// Remove and return every outstanding entry.
    pub fn drain(&mut self) -> Vec<T> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_ids_are_distinct_up_to_capacity() {
        let mut ring = CorrelationRing::new(5);
        let ids: Vec<u64> = (0..5).map(|i| ring.register(format!("req-{i}"))).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn ring_wrap_reuses_id_zero_and_drops_old_entry() {
        let mut ring = CorrelationRing::new(3);
        for i in 0..3 {
            ring.register(i);
        }
        let id = ring.register(99);
        assert_eq!(id, 0);
        // Old occupant of slot 0 is gone, replaced by the new entry.
        assert_eq!(ring.take(0), Some(99));
    }

    #[test]
    fn ring_take_clears_the_slot() {
        let mut ring = CorrelationRing::new(4);
        let id = ring.register("get-version");
        assert_eq!(ring.take(id), Some("get-version"));
        assert_eq!(ring.take(id), None);
    }

    #[test]
    fn ring_take_unknown_id_is_none() {
        let mut ring = CorrelationRing::<u8>::new(4);
        assert_eq!(ring.take(2), None);
        assert_eq!(ring.take(4000), None);
    }

    #[test]
    fn table_resolves_by_id() {
        let mut table = PendingTable::new(10);
        assert!(table.register(41, "a").is_empty());
        assert!(table.register(42, "b").is_empty());
        assert_eq!(table.resolve(41), Some("a"));
        assert_eq!(table.resolve(41), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_bulk_rejects_on_overflow() {
        let mut table = PendingTable::new(3);
        for id in 0..4 {
            assert!(table.register(id, id).is_empty());
        }
        // Fifth registration finds 4 > 3 outstanding and drains them all.
        let evicted = table.register(4, 4);
        assert_eq!(evicted.len(), 4);
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(4), Some(4));
    }
}
