//! Id → location reverse indices.
//!
//! A reverse index is sized to cover ids, not rows, so it grows and shrinks
//! independently of the table it points into.

use std::fmt;

use crate::{
    config::ResizePolicy,
    id::{Id, IdGenerator},
};

/// Maps an [`Id`] to the current location of its record.
///
/// Ids at or beyond [`len`](Self::len) are simply absent.
#[derive(Clone)]
pub struct ReverseIndex<T> {
    slots: Vec<Option<T>>,
}

impl<T: Copy> ReverseIndex<T> {
    /// Create an index covering ids `0..len`, all absent.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Number of ids covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the index covers no ids.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Location of `id`, if live.
    #[must_use]
    pub fn get(&self, id: Id) -> Option<T> {
        self.slots.get(id.index()).copied().flatten()
    }

    /// Check if `id` is live.
    #[must_use]
    pub fn contains(&self, id: Id) -> bool {
        self.get(id).is_some()
    }

    /// Record the location of `id`, growing the index by the policy if it does
    /// not cover `id` yet.
    pub fn insert(&mut self, id: Id, location: T, policy: &ResizePolicy) {
        let idx = id.index();
        if idx >= self.slots.len() {
            let mut len = self.slots.len();
            while len <= idx {
                len = policy.grown(len);
            }
            self.slots.resize(len, None);
        }
        self.slots[idx] = Some(location);
    }

    /// Overwrite the location of a live id. Absent ids are left alone.
    pub fn update(&mut self, id: Id, location: T) {
        if let Some(slot) = self.slots.get_mut(id.index()).filter(|slot| slot.is_some()) {
            *slot = Some(location);
        }
    }

    /// Mark `id` absent, returning its old location.
    pub fn remove(&mut self, id: Id) -> Option<T> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    /// Reallocate to exactly `len` slots, dropping everything past it.
    pub fn resize(&mut self, len: usize) {
        self.slots.truncate(len);
        self.slots.resize(len, None);
        self.slots.shrink_to_fit();
    }

    /// Forget every id and reallocate to `len` slots.
    pub fn reset(&mut self, len: usize) {
        self.slots = vec![None; len];
    }

    /// Live ids and their locations, ascending by id.
    pub fn iter(&self) -> impl Iterator<Item = (Id, T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let id = Id::from_raw(u32::try_from(idx).ok()?);
            slot.map(|location| (id, location))
        })
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for ReverseIndex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Trim an oversized reverse index down to the live id range and clamp the
/// generator to match.
///
/// Returns `true` if the index was reallocated.
pub(crate) fn trim<T: Copy>(
    index: &mut ReverseIndex<T>,
    ids: &mut IdGenerator,
    policy: &ResizePolicy,
) -> bool {
    let necessary = ids.largest_active().map_or(0, |id| id.index() + 1);
    let Some(target) = policy.index_trim(index.len(), necessary) else {
        return false;
    };

    tracing::trace!("reverse index trimmed {} -> {target} slots", index.len());
    index.resize(target);
    ids.clamp();
    true
}
