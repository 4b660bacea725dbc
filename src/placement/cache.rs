//! Single-slot range cache
//!
//! Remembers the last resolved range so repeated lookups inside it skip
//! the table lock. Guarded by its own RwLock, never held while calling
//! into the table.
//!
//! Every invalidation bumps a generation number. A caller reads the
//! generation before consulting the table and hands it back to `refresh`,
//! which refuses to store a decision made before a later invalidation.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::comparator::KeyComparator;

#[derive(Debug, Default)]
struct Slot {
    start: Bytes,
    end: Bytes,
    in_fast_tier: bool,
    valid: bool,
    generation: u64,
}

/// One-entry memo of a range-to-tier decision
pub struct RangeCache {
    comparator: Arc<dyn KeyComparator>,
    slot: RwLock<Slot>,
}

impl RangeCache {
    pub fn new(comparator: Arc<dyn KeyComparator>) -> Self {
        Self {
            comparator,
            slot: RwLock::new(Slot::default()),
        }
    }

    /// Cached decision for `key`, if it falls inside the cached range
    pub fn lookup(&self, key: &[u8]) -> Option<bool> {
        let cmp = self.comparator.as_ref();
        let slot = self.slot.read();
        let hit = slot.valid
            && cmp.compare(key, &slot.start).is_ge()
            && cmp.compare(key, &slot.end).is_le();
        hit.then_some(slot.in_fast_tier)
    }

    pub fn generation(&self) -> u64 {
        self.slot.read().generation
    }

    /// Overwrite the slot with a decision read at `generation`
    ///
    /// Returns false, leaving the slot alone, if an invalidation happened
    /// since `generation` was read.
    pub fn refresh(&self, generation: u64, start: Bytes, end: Bytes, in_fast_tier: bool) -> bool {
        let mut slot = self.slot.write();
        if slot.generation != generation {
            return false;
        }
        slot.start = start;
        slot.end = end;
        slot.in_fast_tier = in_fast_tier;
        slot.valid = true;
        true
    }

    /// Drop the slot if its range overlaps `[start, end]`
    pub fn invalidate_overlapping(&self, start: &[u8], end: &[u8]) {
        let cmp = self.comparator.as_ref();
        let mut slot = self.slot.write();
        slot.generation = slot.generation.wrapping_add(1);
        if slot.valid && cmp.compare(&slot.end, start).is_ge() && cmp.compare(end, &slot.start).is_ge() {
            slot.valid = false;
        }
    }

    pub fn clear(&self) {
        let mut slot = self.slot.write();
        slot.generation = slot.generation.wrapping_add(1);
        slot.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.slot.read().valid
    }
}
