//! Segment Module
//!
//! The heat-tracking interval table.
//!
//! ## Responsibilities
//! - Track key ranges ("segments") with a bounded heat counter
//! - Report when a range crosses the promotion or demotion threshold
//! - Keep hot segments from overlapping (divide or coalesce)
//! - Decay all heats on cooling passes
//!
//! ## Layout
//! ```text
//! ┌──────────────────────── backing array ─────────────────────────┐
//! │ slot 0 │ slot 1 │ ... │ slot L-1 │ overflow ... (grows past L) │
//! └────────────────────────────────────────────────────────────────┘
//!   valid == false marks a free slot; `curr` counts the valid ones
//! ```
//!
//! Range endpoints are inclusive on both sides, so `[0,2]` and `[2,5]`
//! overlap at key `2`.

mod reshape;
mod table;

pub use table::HeatTable;

use bytes::Bytes;

use crate::comparator::KeyComparator;

/// Largest heat a segment can hold (fits one persisted byte)
pub const HEAT_MAX: i32 = 250;

/// A tracked key range with its heat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub start: Bytes,
    pub end: Bytes,
    pub heat: i32,
    pub in_fast_tier: bool,
    /// False marks a free slot; all other fields are then meaningless
    pub valid: bool,
}

impl Segment {
    /// A valid, slow-tier segment owning copies of both keys
    pub fn new(start: &[u8], end: &[u8], heat: i32) -> Self {
        Self {
            start: Bytes::copy_from_slice(start),
            end: Bytes::copy_from_slice(end),
            heat,
            in_fast_tier: false,
            valid: true,
        }
    }

    pub fn contains_key(&self, cmp: &dyn KeyComparator, key: &[u8]) -> bool {
        cmp.compare(key, &self.start).is_ge() && cmp.compare(key, &self.end).is_le()
    }

    /// Whether `[start, end]` lies entirely inside this segment
    pub fn contains_range(&self, cmp: &dyn KeyComparator, start: &[u8], end: &[u8]) -> bool {
        cmp.compare(start, &self.start).is_ge() && cmp.compare(end, &self.end).is_le()
    }

    pub fn overlaps(&self, cmp: &dyn KeyComparator, start: &[u8], end: &[u8]) -> bool {
        !(cmp.compare(&self.end, start).is_lt() || cmp.compare(end, &self.start).is_lt())
    }

    pub fn same_range(&self, cmp: &dyn KeyComparator, start: &[u8], end: &[u8]) -> bool {
        cmp.compare(&self.start, start).is_eq() && cmp.compare(&self.end, end).is_eq()
    }

    pub fn range(&self) -> KeyRange {
        KeyRange {
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }

    pub fn hit(&self) -> SegmentHit {
        SegmentHit {
            start: self.start.clone(),
            end: self.end.clone(),
            heat: self.heat,
            in_fast_tier: self.in_fast_tier,
        }
    }

    /// Apply an access delta and return `(before, after)`.
    ///
    /// An increase past `HEAT_MAX` is rolled back. Heat that drops to zero
    /// frees the slot; the caller owns the `curr` bookkeeping.
    pub(crate) fn apply_delta(&mut self, delta: i32) -> (i32, i32) {
        let before = self.heat;
        let after = before.saturating_add(delta);
        if after > HEAT_MAX {
            return (before, before);
        }
        self.heat = after.max(0);
        if self.heat == 0 {
            self.valid = false;
        }
        (before, self.heat)
    }

    /// Fold another segment's heat into this one, capped at `HEAT_MAX`
    pub(crate) fn absorb_heat(&mut self, heat: i32) {
        self.heat = self.heat.saturating_add(heat).min(HEAT_MAX);
    }
}

/// An inclusive key range handed back to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Bytes,
    pub end: Bytes,
}

impl KeyRange {
    pub fn new(start: &[u8], end: &[u8]) -> Self {
        Self {
            start: Bytes::copy_from_slice(start),
            end: Bytes::copy_from_slice(end),
        }
    }
}

/// Result of a point lookup: the hottest segment covering the key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHit {
    pub start: Bytes,
    pub end: Bytes,
    pub heat: i32,
    pub in_fast_tier: bool,
}

/// Ranges whose tier placement disagrees with their heat
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMigrations {
    /// In the fast tier but at or below the freezing point
    pub demote: Vec<KeyRange>,
    /// Outside the fast tier but at or above the boiling point
    pub promote: Vec<KeyRange>,
}

impl PendingMigrations {
    pub fn is_empty(&self) -> bool {
        self.demote.is_empty() && self.promote.is_empty()
    }
}
