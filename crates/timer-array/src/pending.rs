//! Fixed-capacity set of scheduled timers ordered by modular distance.
//!
//! Expiries are counter values and wrap at `mask + 1`, so two expiries cannot be compared
//! numerically: right before a wrap, an expiry of `4` is later than one of `65533`. Entries are
//! instead ordered by `(expiry - origin) & mask`, where `origin` is a tick that no pending
//! expiry lies before. Moving the origin forward (without passing the earliest entry) keeps the
//! relative order of every entry, so the list stays sorted without re-keying.

use arrayvec::ArrayVec;

use crate::timer::TimerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEntry {
    pub handle: TimerHandle,
    pub expiry: u32,
}

#[derive(Debug, Clone)]
pub struct PendingSet<const N: usize> {
    entries: ArrayVec<PendingEntry, N>,
    origin: u32,
    mask: u32,
}

impl<const N: usize> PendingSet<N> {
    pub fn new(mask: u32) -> Self {
        Self {
            entries: ArrayVec::new(),
            origin: 0,
            mask,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn origin(&self) -> u32 {
        self.origin
    }

    /// Ticks from the origin to `tick`, modulo the counter range.
    pub fn distance(&self, tick: u32) -> u32 {
        tick.wrapping_sub(self.origin) & self.mask
    }

    /// Entry that expires first.
    pub fn nearest(&self) -> Option<&PendingEntry> {
        self.entries.first()
    }

    /// Entries in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingEntry> + '_ {
        self.entries.iter()
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    /// Moves the origin up to `now`, but never past the earliest entry.
    ///
    /// If the earliest entry is already due (the counter passed it while its interrupt was
    /// pending), the origin stops at that entry so it still sorts first.
    pub fn rebase(&mut self, now: u32) {
        let now = now & self.mask;
        self.origin = match self.entries.first() {
            Some(head) if self.distance(now) >= self.distance(head.expiry) => head.expiry,
            _ => now,
        };
    }

    /// True if the earliest entry expires at or before `now`.
    pub fn is_due(&self, now: u32) -> bool {
        self.entries
            .first()
            .is_some_and(|head| self.distance(head.expiry) <= self.distance(now))
    }

    /// Inserts after every entry with the same distance, so ties fire in insertion order.
    ///
    /// Returns `Err(entry)` when the set is full.
    pub fn insert(&mut self, handle: TimerHandle, expiry: u32) -> Result<(), PendingEntry> {
        let entry = PendingEntry {
            handle,
            expiry: expiry & self.mask,
        };
        let key = self.distance(entry.expiry);
        let at = self
            .entries
            .partition_point(|e| self.distance(e.expiry) <= key);
        self.entries.try_insert(at, entry).map_err(|e| e.element())
    }

    pub fn remove(&mut self, handle: TimerHandle) -> Option<PendingEntry> {
        let at = self.entries.iter().position(|e| e.handle == handle)?;
        Some(self.entries.remove(at))
    }

    /// Removes and returns every entry due at `now`, earliest first.
    ///
    /// Every entry left behind expires after `now`, so the origin moves to `now` and entries
    /// re-armed during dispatch are ordered by how far ahead of `now` they lie.
    pub fn pop_due(&mut self, now: u32) -> ArrayVec<PendingEntry, N> {
        let elapsed = self.distance(now);
        let count = self
            .entries
            .partition_point(|e| self.distance(e.expiry) <= elapsed);
        let due: ArrayVec<PendingEntry, N> = self.entries.drain(..count).collect();
        if !due.is_empty() {
            self.origin = now & self.mask;
        }
        due
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(index: u16) -> TimerHandle {
        TimerHandle {
            index,
            generation: 0,
        }
    }

    fn order<const N: usize>(set: &PendingSet<N>) -> Vec<u16> {
        set.iter().map(|e| e.handle.index).collect()
    }

    #[test]
    fn wrapped_expiry_sorts_after_pre_wrap_expiry() {
        let mut set = PendingSet::<4>::new(0xFFFF);
        set.rebase(65_530);
        set.insert(handle(0), 65_530u32.wrapping_add(10) & 0xFFFF).unwrap();
        set.insert(handle(1), 65_530 + 3).unwrap();

        assert_eq!(set.nearest().unwrap().expiry, 65_533);
        assert_eq!(order(&set), vec![1, 0]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut set = PendingSet::<4>::new(0xFFFF);
        set.insert(handle(2), 100).unwrap();
        set.insert(handle(0), 100).unwrap();
        set.insert(handle(1), 50).unwrap();
        set.insert(handle(3), 100).unwrap();
        assert_eq!(order(&set), vec![1, 2, 0, 3]);
    }

    #[test]
    fn rebase_stops_at_overdue_head() {
        let mut set = PendingSet::<4>::new(0xFFFF);
        set.insert(handle(0), 10).unwrap();
        set.insert(handle(1), 20).unwrap();

        set.rebase(15);
        assert_eq!(set.origin(), 10);
        assert!(set.is_due(15));

        // A late insertion still lands behind the overdue head.
        set.insert(handle(2), 16).unwrap();
        assert_eq!(order(&set), vec![0, 2, 1]);
    }

    #[test]
    fn rebase_on_empty_set_moves_to_now() {
        let mut set = PendingSet::<2>::new(0xFFFF);
        set.rebase(0x1_2345);
        assert_eq!(set.origin(), 0x2345);
    }

    #[test]
    fn pop_due_takes_every_expired_entry() {
        let mut set = PendingSet::<4>::new(0xFFFF);
        set.insert(handle(0), 5).unwrap();
        set.insert(handle(1), 5).unwrap();
        set.insert(handle(2), 7).unwrap();
        set.insert(handle(3), 9).unwrap();

        let due = set.pop_due(7);
        assert_eq!(
            due.iter().map(|e| e.handle.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(set.origin(), 7);
        assert_eq!(order(&set), vec![3]);
        assert!(set.pop_due(8).is_empty());
    }

    #[test]
    fn late_pop_orders_reinsertions_from_now() {
        let mut set = PendingSet::<4>::new(0xFFFF);
        set.rebase(65_000);
        set.insert(handle(0), 65_534).unwrap();
        set.insert(handle(1), 65_535).unwrap();
        set.insert(handle(2), 100).unwrap();

        assert_eq!(set.pop_due(65_535).len(), 2);
        // One tick short of a full range ahead of now: must sort after everything pending.
        set.insert(handle(1), 65_534).unwrap();
        assert_eq!(order(&set), vec![2, 1]);
        assert!(!set.is_due(65_535));
    }

    #[test]
    fn insert_into_full_set_returns_entry() {
        let mut set = PendingSet::<1>::new(0xFFFF);
        set.insert(handle(0), 1).unwrap();
        let rejected = set.insert(handle(1), 2).unwrap_err();
        assert_eq!(rejected.handle, handle(1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut set = PendingSet::<4>::new(0xFFFF);
        set.insert(handle(0), 3).unwrap();
        set.insert(handle(1), 1).unwrap();
        set.insert(handle(2), 2).unwrap();

        assert_eq!(set.remove(handle(2)).unwrap().expiry, 2);
        assert!(set.remove(handle(2)).is_none());
        assert_eq!(order(&set), vec![1, 0]);
        assert!(!set.contains(handle(2)));
    }
}
