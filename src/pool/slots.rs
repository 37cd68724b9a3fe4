//! Free/busy bookkeeping for interpreter slots

use std::collections::BTreeSet;

/// One hand-out of a slot. The generation changes every time the slot is
/// taken, so a stale lease cannot free a later holder's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotLease {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

/// Tracks which of `pool_size` slots are free or busy.
///
/// Every index in `0..pool_size` is in exactly one of the two sets.
#[derive(Debug, Default)]
pub(crate) struct SlotAllocator {
    free: BTreeSet<usize>,
    busy: BTreeSet<usize>,
    generations: Vec<u64>,
    size: usize,
}

impl SlotAllocator {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            free: (0..size).collect(),
            busy: BTreeSet::new(),
            generations: vec![0; size],
            size,
        }
    }

    /// Move the lowest free index to the busy set
    pub(crate) fn take(&mut self) -> Option<SlotLease> {
        let index = self.free.pop_first()?;
        self.busy.insert(index);
        let generation = match self.generations.get_mut(index) {
            Some(generation) => {
                *generation += 1;
                *generation
            }
            None => 0,
        };
        Some(SlotLease { index, generation })
    }

    /// Return a busy index to the free set. False if it was not busy.
    pub(crate) fn give_back(&mut self, index: usize) -> bool {
        if !self.busy.remove(&index) {
            return false;
        }
        self.free.insert(index);
        true
    }

    /// Return the slot only if `lease` is still its current hand-out
    pub(crate) fn give_back_lease(&mut self, lease: SlotLease) -> bool {
        if self.generations.get(lease.index) != Some(&lease.generation) {
            return false;
        }
        self.give_back(lease.index)
    }

    pub(crate) fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn busy_count(&self) -> usize {
        self.busy.len()
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }
}
