//! # wirec-dsa: Top-N Heavy Hitters
//!
//! A fixed-capacity open-addressed hash table paired with a binary min-heap.
//! The heap root always holds the lightest member, so rejecting a value that
//! cannot make the cut costs one comparison.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::hash::Hash;

use crate::error::DsaError;
use crate::hash::hash32;

/// Marks an empty heap slot (a zero-weight placeholder) or a slot with no heap position.
const NONE: u32 = u32::MAX;

/// Tracks the `N` highest-weight items seen so far.
///
/// ## Layout
/// Parallel arrays of `2N` hash slots (`hashes`, `items`, `weights`,
/// `heap_index`) and an `N`-entry `heap` of slot indices. Keeping the load
/// factor at or below one half guarantees every linear scan meets an empty
/// slot.
///
/// ## Contract
/// Weights follow the cash-register model: an item's weight may be raised or
/// kept, never lowered. Lowering one is rejected with `WeightDecrease`.
#[derive(Clone)]
pub struct TopHeavyHitters<T> {
    max: usize,
    mask: usize,
    hashes: Vec<u32>,
    items: Vec<Option<T>>,
    weights: Vec<u64>,
    heap_index: Vec<u32>,
    heap: Vec<u32>,
    len: usize,
}

impl<T: fmt::Debug> fmt::Debug for TopHeavyHitters<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopHeavyHitters")
            .field("capacity", &self.max)
            .field("len", &self.len)
            .field("lowest_weight", &self.lowest_weight())
            .finish()
    }
}

impl<T> TopHeavyHitters<T> {
    pub fn capacity(&self) -> usize {
        self.max
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Weight an item must exceed to enter the set. Zero until the heap fills.
    #[inline(always)]
    pub fn lowest_weight(&self) -> u64 {
        self.heap_weight(0)
    }

    /// Current members, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter().flatten()
    }

    /// Current members with their recorded weights.
    pub fn iter_weighted(&self) -> impl Iterator<Item = (&T, u64)> + '_ {
        self.items
            .iter()
            .zip(self.weights.iter())
            .filter_map(|(item, &w)| item.as_ref().map(|i| (i, w)))
    }

    #[inline(always)]
    fn heap_weight(&self, pos: usize) -> u64 {
        match self.heap[pos] {
            NONE => 0,
            slot => self.weights[slot as usize],
        }
    }
}

impl<T: Hash + Eq> TopHeavyHitters<T> {
    /// Creates a tracker for the top `max` items.
    ///
    /// `max` of 0 means "disabled" and is adjusted to a single slot; any other
    /// value must be a power of two.
    pub fn new(max: usize) -> Result<Self, DsaError> {
        let max = if max == 0 { 1 } else { max };
        if !max.is_power_of_two() || max > (u32::MAX as usize) / 2 {
            return Err(DsaError::NonPowerOfTwoCapacity { capacity: max });
        }
        let slots = max * 2;

        let mut items = Vec::with_capacity(slots);
        items.resize_with(slots, || None);

        Ok(Self {
            max,
            mask: slots - 1,
            hashes: vec![0; slots],
            items,
            weights: vec![0; slots],
            heap_index: vec![NONE; slots],
            heap: vec![NONE; max],
            len: 0,
        })
    }

    pub fn contains(&self, item: &T) -> bool {
        self.find(hash32(item, 0), item).is_some()
    }

    pub fn weight_of(&self, item: &T) -> Option<u64> {
        self.find(hash32(item, 0), item).map(|idx| self.weights[idx])
    }

    /// Records `count` as the new weight of `item`.
    ///
    /// Returns `true` iff `item` is a member after the call, either because it
    /// already was or because it just displaced the lightest member. The one
    /// exception is the fast path: a `count` below the lowest member weight
    /// returns `false` without looking `item` up, so a member reported below
    /// that weight (a decrease, outside the contract) is not detected there.
    ///
    /// ## Performance
    /// The fast path costs one comparison, with no hashing and no clone.
    /// `item` is cloned only when it is promoted. Promotion and weight raises
    /// cost O(log N).
    pub fn update(&mut self, item: &T, count: u64) -> Result<bool, DsaError>
    where
        T: Clone,
    {
        let lowest = self.lowest_weight();
        if count < lowest {
            return Ok(false);
        }

        let hash = hash32(item, 0);
        match self.find(hash, item) {
            Some(idx) => {
                self.raise_weight(idx, count)?;
                Ok(true)
            }
            // Ties with the current minimum do not displace it.
            None if count == lowest => Ok(false),
            None => {
                self.insert_new_heavy(hash, item.clone(), count);
                Ok(true)
            }
        }
    }

    fn raise_weight(&mut self, idx: usize, count: u64) -> Result<(), DsaError> {
        let current = self.weights[idx];
        if count < current {
            return Err(DsaError::WeightDecrease {
                current,
                requested: count,
            });
        }
        if count != current {
            self.weights[idx] = count;
            self.sift_down(self.heap_index[idx] as usize);
        }
        Ok(())
    }

    fn insert_new_heavy(&mut self, hash: u32, item: T, count: u64) {
        // Evict the root. While the heap is filling it is a placeholder.
        let evicted = self.heap[0];
        if evicted != NONE {
            self.remove_slot(evicted as usize);
        } else {
            self.len += 1;
        }

        let idx = self.insert_slot(hash, item, count);
        self.heap[0] = idx as u32;
        self.heap_index[idx] = 0;
        self.sift_down(0);

        tracing::trace!("TopHeavyHitters: promoted slot {} (weight {})", idx, count);
    }

    fn find(&self, hash: u32, item: &T) -> Option<usize> {
        let mut idx = hash as usize & self.mask;
        for _ in 0..=self.mask {
            match &self.items[idx] {
                None => return None,
                Some(existing) if self.hashes[idx] == hash && existing == item => {
                    return Some(idx)
                }
                Some(_) => idx = (idx + 1) & self.mask,
            }
        }
        None
    }

    fn insert_slot(&mut self, hash: u32, item: T, weight: u64) -> usize {
        let mut idx = hash as usize & self.mask;
        while self.items[idx].is_some() {
            idx = (idx + 1) & self.mask;
        }
        self.hashes[idx] = hash;
        self.items[idx] = Some(item);
        self.weights[idx] = weight;
        idx
    }

    /// Backward-shift deletion: entries further along the collision run move into
    /// the hole when their home slot does not lie between the hole and them.
    fn remove_slot(&mut self, idx: usize) {
        self.clear_slot(idx);

        let mut hole = idx;
        let mut next = (idx + 1) & self.mask;
        while self.items[next].is_some() {
            let home = self.hashes[next] as usize & self.mask;
            let home_to_next = next.wrapping_sub(home) & self.mask;
            let hole_to_next = next.wrapping_sub(hole) & self.mask;
            if hole_to_next <= home_to_next {
                self.move_slot(next, hole);
                hole = next;
            }
            next = (next + 1) & self.mask;
        }
    }

    fn move_slot(&mut self, from: usize, to: usize) {
        self.items[to] = self.items[from].take();
        self.hashes[to] = self.hashes[from];
        self.weights[to] = self.weights[from];
        let heap_pos = self.heap_index[from];
        self.heap_index[to] = heap_pos;
        if heap_pos != NONE {
            self.heap[heap_pos as usize] = to as u32;
        }
        self.clear_slot(from);
    }

    fn clear_slot(&mut self, idx: usize) {
        self.items[idx] = None;
        self.hashes[idx] = 0;
        self.weights[idx] = 0;
        self.heap_index[idx] = NONE;
    }

    /// Restores the min-heap below `pos`. Weights only grow, so an upward
    /// pass is never needed.
    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let left = 2 * pos + 1;
            if left >= self.max {
                break;
            }
            let right = left + 1;

            let mut smallest = pos;
            if self.heap_weight(left) < self.heap_weight(smallest) {
                smallest = left;
            }
            if right < self.max && self.heap_weight(right) < self.heap_weight(smallest) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }

            self.heap.swap(pos, smallest);
            for p in [pos, smallest] {
                let slot = self.heap[p];
                if slot != NONE {
                    self.heap_index[slot as usize] = p as u32;
                }
            }
            pos = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use proptest::prelude::*;

    static CLONES: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, PartialEq, Eq, Hash)]
    struct Counted(u32);

    impl Clone for Counted {
        fn clone(&self) -> Self {
            CLONES.fetch_add(1, Ordering::Relaxed);
            Counted(self.0)
        }
    }

    fn members(hh: &TopHeavyHitters<&'static str>) -> Vec<&'static str> {
        let mut out: Vec<_> = hh.iter().copied().collect();
        out.sort();
        out
    }

    #[test]
    fn test_capacity_must_be_power_of_two() {
        assert_eq!(
            TopHeavyHitters::<u32>::new(3).unwrap_err(),
            DsaError::NonPowerOfTwoCapacity { capacity: 3 }
        );
        assert_eq!(TopHeavyHitters::<u32>::new(0).unwrap().capacity(), 1);
        assert_eq!(TopHeavyHitters::<u32>::new(256).unwrap().capacity(), 256);
    }

    #[test]
    fn test_lightest_is_evicted() {
        let mut hh = TopHeavyHitters::new(4).unwrap();
        assert!(hh.update(&"A", 1).unwrap());
        assert!(hh.update(&"B", 2).unwrap());
        assert!(hh.update(&"C", 3).unwrap());
        assert!(hh.update(&"D", 4).unwrap());
        assert_eq!(hh.lowest_weight(), 1);

        assert!(hh.update(&"E", 5).unwrap());
        assert_eq!(members(&hh), ["B", "C", "D", "E"]);
        assert_eq!(hh.lowest_weight(), 2);
        assert_eq!(hh.len(), 4);
    }

    #[test]
    fn test_below_minimum_is_rejected() {
        let mut hh = TopHeavyHitters::new(2).unwrap();
        hh.update(&"x", 10).unwrap();
        hh.update(&"y", 20).unwrap();

        assert!(!hh.update(&"z", 9).unwrap());
        // A tie with the minimum does not displace it.
        assert!(!hh.update(&"z", 10).unwrap());
        assert_eq!(members(&hh), ["x", "y"]);
    }

    #[test]
    fn test_existing_member_reports_membership() {
        let mut hh = TopHeavyHitters::new(2).unwrap();
        hh.update(&"x", 10).unwrap();
        hh.update(&"y", 20).unwrap();

        assert!(hh.update(&"x", 10).unwrap());
        assert!(hh.update(&"x", 30).unwrap());
        assert_eq!(hh.weight_of(&"x"), Some(30));
        // "y" is now the lightest.
        assert_eq!(hh.lowest_weight(), 20);
    }

    /// Warm tracker: rejected hits and weight raises never clone the item.
    #[test]
    fn test_only_promotion_clones() {
        let mut hh = TopHeavyHitters::new(2).unwrap();
        hh.update(&Counted(1), 100).unwrap();
        hh.update(&Counted(2), 200).unwrap();
        let promoted = CLONES.load(Ordering::Relaxed);

        for i in 0..1000 {
            assert!(!hh.update(&Counted(10 + i), 50).unwrap());
        }
        assert!(hh.update(&Counted(1), 300).unwrap());
        assert_eq!(CLONES.load(Ordering::Relaxed), promoted);

        assert!(hh.update(&Counted(3), 400).unwrap());
        assert_eq!(CLONES.load(Ordering::Relaxed), promoted + 1);
    }

    /// Debug output needs only `T: Debug`.
    #[test]
    fn test_debug_reports_lowest_weight() {
        let mut hh = TopHeavyHitters::new(2).unwrap();
        hh.update(&"x", 10).unwrap();
        hh.update(&"y", 20).unwrap();
        let shown = alloc::format!("{:?}", hh);
        assert!(shown.contains("lowest_weight: 10"));
        assert!(shown.contains("len: 2"));
    }

    /// The O(1) reject path answers `false` without looking the item up.
    #[test]
    fn test_fast_path_skips_membership_lookup() {
        let mut hh = TopHeavyHitters::new(2).unwrap();
        hh.update(&"x", 10).unwrap();
        hh.update(&"y", 20).unwrap();

        assert!(!hh.update(&"x", 5).unwrap());
        assert!(hh.contains(&"x"));
        assert_eq!(hh.weight_of(&"x"), Some(10));
    }

    #[test]
    fn test_weight_decrease_is_rejected() {
        let mut hh = TopHeavyHitters::new(4).unwrap();
        hh.update(&"x", 10).unwrap();
        assert_eq!(
            hh.update(&"x", 7).unwrap_err(),
            DsaError::WeightDecrease {
                current: 10,
                requested: 7
            }
        );
        assert_eq!(hh.weight_of(&"x"), Some(10));
    }

    #[test]
    fn test_disabled_tracker_keeps_single_heaviest() {
        let mut hh = TopHeavyHitters::new(0).unwrap();
        hh.update(&"a", 1).unwrap();
        hh.update(&"b", 5).unwrap();
        hh.update(&"c", 3).unwrap();
        assert_eq!(members(&hh), ["b"]);
    }

    #[test]
    fn test_churn_keeps_collision_chains_intact() {
        // Heavy churn through a small table exercises backward-shift deletion.
        let mut hh = TopHeavyHitters::new(8).unwrap();
        for round in 1..=50u64 {
            for key in 0..32u32 {
                hh.update(&key, round * 100 + key as u64).unwrap();
            }
        }
        let mut keys: Vec<u32> = hh.iter().copied().collect();
        keys.sort();
        assert_eq!(keys, (24..32).collect::<Vec<_>>());
        for key in 24..32u32 {
            assert!(hh.contains(&key));
        }
    }

    proptest! {
        #[test]
        fn tracks_the_n_heaviest(
            steps in proptest::collection::vec((0u32..64, 1u64..20), 1..500),
        ) {
            let mut hh = TopHeavyHitters::new(8).unwrap();
            let mut weights: BTreeMap<u32, u64> = BTreeMap::new();

            for (key, bump) in steps {
                let w = weights.entry(key).or_insert(0);
                *w += bump;
                hh.update(&key, *w).unwrap();
            }

            let mut ranked: Vec<u64> = weights.values().copied().collect();
            ranked.sort_unstable_by(|a, b| b.cmp(a));
            let n = hh.capacity().min(ranked.len());
            prop_assert_eq!(hh.len(), n);

            // Ties at the boundary make the exact member set ambiguous, so
            // compare the multiset of weights instead of the keys.
            let mut tracked: Vec<u64> = hh.iter_weighted().map(|(_, w)| w).collect();
            tracked.sort_unstable_by(|a, b| b.cmp(a));
            prop_assert_eq!(&tracked[..], &ranked[..n]);

            for (key, w) in hh.iter_weighted() {
                prop_assert_eq!(weights[key], w);
            }
        }
    }
}
