//! Record identifiers and the lowest-first id allocator.
//!
//! Ids are stable for the lifetime of the record they name and are handed
//! back out only after that record is destroyed. The allocator always returns
//! the smallest id not currently in use, which keeps reverse indices compact.

use std::fmt;

use bytemuck::{Pod, Zeroable};

/// Stable external identifier of a component instance or an entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
#[repr(transparent)]
pub struct Id(u32);

impl Id {
    /// Create an id from a raw value.
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// The id as an index into a reverse index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.0)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Id {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

/// Allocator for unique ids that always hands out the lowest free value.
///
/// Recycled ids are kept sorted in *descending* order so the lowest one sits
/// at the end of the vector and `allocate` is a `pop`.
#[derive(Clone)]
pub struct IdGenerator {
    /// Next never-issued id.
    fresh: u32,
    /// Recycled ids, sorted descending.
    recycled: Vec<u32>,
    /// Largest id that is issued and not recycled.
    largest: Option<u32>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator {
    /// Create a generator starting at id 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fresh: 0,
            recycled: Vec::new(),
            largest: None,
        }
    }

    /// Issue the lowest currently unused id.
    ///
    /// # Panics
    ///
    /// Panics if the 32-bit id space is exhausted.
    pub fn allocate(&mut self) -> Id {
        let id = match self.recycled.last() {
            Some(&lowest) if lowest < self.fresh => {
                self.recycled.pop();
                lowest
            }
            _ => {
                let id = self.fresh;
                self.fresh = self.fresh.checked_add(1).expect("id space exhausted");
                id
            }
        };

        self.largest = Some(self.largest.map_or(id, |largest| largest.max(id)));
        Id(id)
    }

    /// Return an id to the pool so it can be issued again.
    ///
    /// Recycling an id that is already in the pool, or was never issued, is
    /// ignored.
    pub fn recycle(&mut self, id: Id) {
        let raw = id.0;
        if raw >= self.fresh {
            return;
        }

        // Descending order: search with a reversed comparator.
        match self.recycled.binary_search_by(|probe| raw.cmp(probe)) {
            Ok(_) => return,
            Err(pos) => self.recycled.insert(pos, raw),
        }

        if self.largest == Some(raw) {
            self.seek_largest();
        }
    }

    /// Reset the fresh counter to `floor` and drop recycled ids `>= floor`.
    ///
    /// Used after the owner trims a reverse index down to `floor` entries.
    pub fn set_state(&mut self, floor: Id) {
        let floor = floor.0;
        // Descending: everything before the first value < floor is discarded.
        let keep_from = self.recycled.partition_point(|&v| v >= floor);
        self.recycled.drain(..keep_from);
        self.fresh = floor;
    }

    /// Clamp the fresh counter to just past the largest live id.
    pub fn clamp(&mut self) {
        let floor = self.largest.map_or(0, |largest| largest + 1);
        self.set_state(Id(floor));
    }

    /// The largest id that has been issued and not recycled.
    #[must_use]
    pub fn largest_active(&self) -> Option<Id> {
        self.largest.map(Id)
    }

    /// The id `allocate` would return.
    #[must_use]
    pub fn peek(&self) -> Id {
        match self.recycled.last() {
            Some(&lowest) if lowest < self.fresh => Id(lowest),
            _ => Id(self.fresh),
        }
    }

    /// Number of ids waiting to be reissued.
    #[must_use]
    pub fn recycled_len(&self) -> usize {
        self.recycled.len()
    }

    /// Forget every issued id.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // When the largest live id is recycled, walk down through the contiguous
    // run of recycled ids at the top to find the next largest live one.
    fn seek_largest(&mut self) {
        let mut candidate = i64::from(self.fresh) - 1;
        for &value in &self.recycled {
            if i64::from(value) == candidate {
                candidate -= 1;
            } else if i64::from(value) < candidate {
                break;
            }
        }
        self.largest = u32::try_from(candidate).ok();
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("next", &self.peek())
            .field("largest", &self.largest)
            .field("recycled", &self.recycled.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_allocation() {
        let mut ids = IdGenerator::new();

        assert_eq!(ids.allocate(), Id(0));
        assert_eq!(ids.allocate(), Id(1));
        assert_eq!(ids.allocate(), Id(2));
        assert_eq!(ids.largest_active(), Some(Id(2)));
    }

    #[test]
    fn test_lowest_recycled_first() {
        let mut ids = IdGenerator::new();
        for _ in 0..5 {
            ids.allocate();
        }

        ids.recycle(Id(3));
        ids.recycle(Id(1));

        assert_eq!(ids.allocate(), Id(1));
        assert_eq!(ids.allocate(), Id(3));
        assert_eq!(ids.allocate(), Id(5));
    }

    #[test]
    fn test_largest_seeks_back_through_recycled_run() {
        let mut ids = IdGenerator::new();
        for _ in 0..10 {
            ids.allocate();
        }

        ids.recycle(Id(7));
        ids.recycle(Id(8));
        assert_eq!(ids.largest_active(), Some(Id(9)));

        ids.recycle(Id(9));
        assert_eq!(ids.largest_active(), Some(Id(6)));
    }

    #[test]
    fn test_largest_with_gap_below() {
        let mut ids = IdGenerator::new();
        for _ in 0..10 {
            ids.allocate();
        }

        ids.recycle(Id(5));
        ids.recycle(Id(9));
        assert_eq!(ids.largest_active(), Some(Id(8)));
    }

    #[test]
    fn test_largest_empty() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.largest_active(), None);

        let id = ids.allocate();
        ids.recycle(id);
        assert_eq!(ids.largest_active(), None);
    }

    #[test]
    fn test_double_recycle_ignored() {
        let mut ids = IdGenerator::new();
        let a = ids.allocate();
        ids.allocate();

        ids.recycle(a);
        ids.recycle(a);
        assert_eq!(ids.recycled_len(), 1);

        // Never issued.
        ids.recycle(Id(40));
        assert_eq!(ids.recycled_len(), 1);
    }

    #[test]
    fn test_set_state_discards_high_recycled() {
        let mut ids = IdGenerator::new();
        for _ in 0..10 {
            ids.allocate();
        }
        for raw in [2, 6, 7, 8, 9] {
            ids.recycle(Id(raw));
        }
        assert_eq!(ids.largest_active(), Some(Id(5)));

        ids.clamp();

        assert_eq!(ids.recycled_len(), 1);
        assert_eq!(ids.allocate(), Id(2));
        assert_eq!(ids.allocate(), Id(6));
    }

    #[test]
    fn test_largest_after_reissue() {
        let mut ids = IdGenerator::new();
        for _ in 0..4 {
            ids.allocate();
        }
        ids.recycle(Id(3));
        assert_eq!(ids.largest_active(), Some(Id(2)));

        assert_eq!(ids.allocate(), Id(3));
        assert_eq!(ids.largest_active(), Some(Id(3)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn allocate_is_always_lowest_unused(
                ops in proptest::collection::vec((any::<bool>(), 0usize..64), 1..200),
            ) {
                let mut ids = IdGenerator::new();
                let mut live: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();

                for (allocate, pick) in ops {
                    if allocate || live.is_empty() {
                        let expected = (0..).find(|v| !live.contains(v)).unwrap();
                        let id = ids.allocate();
                        prop_assert_eq!(id.as_raw(), expected);
                        live.insert(id.as_raw());
                    } else {
                        let victim = *live.iter().nth(pick % live.len()).unwrap();
                        live.remove(&victim);
                        ids.recycle(Id(victim));
                    }

                    prop_assert_eq!(ids.largest_active().map(Id::as_raw), live.iter().next_back().copied());
                }
            }
        }
    }
}
