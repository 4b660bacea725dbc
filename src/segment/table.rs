//! Heat table implementation
//!
//! Array-of-segments table behind a single RwLock.

use std::mem;
use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;

use crate::comparator::KeyComparator;
use crate::config::{PlacementConfig, SlotReusePolicy};
use crate::error::{HeatError, Result};
use crate::persist;

use super::{KeyRange, PendingMigrations, Segment, SegmentHit, HEAT_MAX};

/// Adaptive hot/cold range table
///
/// ## Concurrency:
/// - `state`: one RwLock over the whole backing array
/// - `store_seg`, `cooling`, `change_in_lsm` and every divide/coalesce
///   helper run under the write lock
/// - `find_seg`, `pending_migrations` and the save path take the read lock
/// - Heat is never touched outside the lock: a merge can move or free a
///   segment between two updates
pub struct HeatTable {
    pub(super) comparator: Arc<dyn KeyComparator>,
    pub(super) target_len: usize,
    pub(super) boiling_point: i32,
    pub(super) freezing_point: i32,
    slot_policy: SlotReusePolicy,
    state: RwLock<TableState>,
}

/// Everything guarded by the table lock
#[derive(Debug)]
pub(super) struct TableState {
    pub(super) segments: Vec<Segment>,
    /// Number of valid segments
    pub(super) curr: usize,
}

impl TableState {
    fn first_free(&self) -> Option<usize> {
        self.segments.iter().position(|s| !s.valid)
    }

    fn coldest(&self) -> Option<i32> {
        self.segments.iter().filter(|s| s.valid).map(|s| s.heat).min()
    }

    /// Store a valid segment in `slot`, or append it when `slot` is None
    fn place(&mut self, slot: Option<usize>, segment: Segment) -> usize {
        self.curr += 1;
        match slot {
            Some(index) => {
                self.segments[index] = segment;
                index
            }
            None => {
                self.segments.push(segment);
                self.segments.len() - 1
            }
        }
    }

    /// Store a valid segment in the first free slot, growing if needed
    pub(super) fn allocate(&mut self, segment: Segment) -> usize {
        let slot = self.first_free();
        self.place(slot, segment)
    }

    /// Free a slot and return what it held
    pub(super) fn release(&mut self, index: usize) -> Segment {
        self.curr -= 1;
        mem::take(&mut self.segments[index])
    }
}

impl HeatTable {
    /// Create an empty table with `target_len` free slots
    ///
    /// Fails when `target_len` is zero, the thresholds are outside
    /// `[0, HEAT_MAX]` or `boiling_point < freezing_point`.
    pub fn new(
        target_len: usize,
        boiling_point: i32,
        freezing_point: i32,
        comparator: Arc<dyn KeyComparator>,
    ) -> Result<Self> {
        if target_len == 0 {
            return Err(HeatError::Invariant("target length must be >= 1".into()));
        }
        if boiling_point < freezing_point {
            return Err(HeatError::Invariant(format!(
                "boiling point ({}) must be >= freezing point ({})",
                boiling_point, freezing_point
            )));
        }
        if freezing_point < 0 || boiling_point > HEAT_MAX {
            return Err(HeatError::Invariant(format!(
                "thresholds must lie within [0, {}]",
                HEAT_MAX
            )));
        }

        Ok(Self {
            comparator,
            target_len,
            boiling_point,
            freezing_point,
            slot_policy: SlotReusePolicy::default(),
            state: RwLock::new(TableState {
                segments: vec![Segment::default(); target_len],
                curr: 0,
            }),
        })
    }

    /// Create a table from a validated placement config
    pub fn from_config(config: &PlacementConfig, comparator: Arc<dyn KeyComparator>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.target_len,
            config.boiling_point,
            config.freezing_point,
            comparator,
        )?
        .with_slot_policy(config.slot_policy))
    }

    pub fn with_slot_policy(mut self, policy: SlotReusePolicy) -> Self {
        self.slot_policy = policy;
        self
    }

    // =========================================================================
    // Heat Updates
    // =========================================================================

    /// Add `delta` heat to the range `[start, end]`
    ///
    /// Returns true exactly when this call moves a range across a tier
    /// threshold: up to the boiling point while outside the fast tier, or
    /// down to the freezing point while inside it. Reversed endpoints are
    /// swapped.
    ///
    /// Matching order:
    /// 1. a segment with the identical range
    /// 2. over target length: the hottest hot segment containing the range
    /// 3. over target length, hot delta: the first hot segment it overlaps
    /// 4. over target length, cold delta: the cold segment giving the
    ///    smallest union
    /// 5. a new segment
    ///
    /// # Errors
    ///
    /// `HeatError::Invariant` for a zero delta on an existing segment or a
    /// non-positive delta on a new one; the table is left unchanged.
    pub fn store_seg(&self, start: &[u8], end: &[u8], delta: i32) -> Result<bool> {
        self.store_seg_span(start, end, delta).map(|(crossed, _)| crossed)
    }

    /// `store_seg`, also returning the key range whose tier decision the
    /// update may have changed
    ///
    /// That is `[start, end]` widened to the segment the heat landed on,
    /// which can be a container or a segment grown to absorb the range.
    pub fn store_seg_span(&self, start: &[u8], end: &[u8], delta: i32) -> Result<(bool, KeyRange)> {
        let cmp = self.comparator.as_ref();
        let (start, end) = if cmp.compare(start, end).is_gt() {
            (end, start)
        } else {
            (start, end)
        };

        let mut st = self.state.write();

        if let Some(index) = self.hottest_identical(&st, start, end) {
            let crossed = self.update_existing(&mut st, index, delta, false)?;
            return Ok((crossed, KeyRange::new(start, end)));
        }

        if st.curr > self.target_len {
            if let Some(index) = self.hottest_container(&st, start, end) {
                let span = st.segments[index].range();
                let crossed = self.update_existing(&mut st, index, delta, true)?;
                return Ok((crossed, span));
            }

            if delta > 0 && delta >= self.boiling_point {
                if let Some(index) = self.first_hot_overlap(&st, start, end) {
                    let span = self.span_with(&st.segments[index], start, end);
                    self.absorb_hot_range(&mut st, index, start, end, delta);
                    return Ok((true, span));
                }
            }

            if delta > 0 && delta < self.boiling_point {
                if let Some(index) = self.smallest_cold_union(&st, start, end) {
                    let span = self.span_with(&st.segments[index], start, end);
                    let crossed = self.widen_cold(&mut st, index, start, end, delta);
                    return Ok((crossed, span));
                }
            }
        }

        let crossed = self.insert_new(&mut st, start, end, delta)?;
        Ok((crossed, KeyRange::new(start, end)))
    }

    /// Union of a segment's range and `[start, end]`
    fn span_with(&self, seg: &Segment, start: &[u8], end: &[u8]) -> KeyRange {
        let cmp = self.comparator.as_ref();
        let lo = if cmp.compare(start, &seg.start).is_lt() { start } else { &seg.start[..] };
        let hi = if cmp.compare(end, &seg.end).is_gt() { end } else { &seg.end[..] };
        KeyRange::new(lo, hi)
    }

    /// Whether heat moving `before -> after` crosses a tier threshold
    fn crossed(&self, before: i32, after: i32, in_fast_tier: bool) -> bool {
        (!in_fast_tier && before < self.boiling_point && after >= self.boiling_point)
            || (in_fast_tier && before > self.freezing_point && after <= self.freezing_point)
    }

    fn update_existing(
        &self,
        st: &mut TableState,
        index: usize,
        delta: i32,
        container: bool,
    ) -> Result<bool> {
        if delta == 0 {
            return Err(HeatError::Invariant(
                "existing segment updated with a zero heat delta".into(),
            ));
        }

        let in_fast_tier = st.segments[index].in_fast_tier;
        let (before, after) = st.segments[index].apply_delta(delta);
        let crossed = self.crossed(before, after, in_fast_tier);

        if !st.segments[index].valid {
            st.release(index);
            return Ok(crossed);
        }

        if after >= self.boiling_point && (before < self.boiling_point || container) {
            self.divide_or_coalesce(st, index);
        }
        Ok(crossed)
    }

    /// Hottest segment with exactly `[start, end]`, lowest index on ties
    ///
    /// A divide can leave a hot intersection with the same range as an
    /// older cold segment; the hot one is the segment lookups report, so
    /// it is the one that keeps accumulating heat.
    fn hottest_identical(&self, st: &TableState, start: &[u8], end: &[u8]) -> Option<usize> {
        let cmp = self.comparator.as_ref();
        let mut best: Option<usize> = None;
        for (i, seg) in st.segments.iter().enumerate() {
            if seg.valid
                && seg.same_range(cmp, start, end)
                && best.map_or(true, |b| seg.heat > st.segments[b].heat)
            {
                best = Some(i);
            }
        }
        best
    }

    fn hottest_container(&self, st: &TableState, start: &[u8], end: &[u8]) -> Option<usize> {
        let cmp = self.comparator.as_ref();
        let mut best: Option<usize> = None;
        for (i, seg) in st.segments.iter().enumerate() {
            if !seg.valid || seg.heat < self.boiling_point || !seg.contains_range(cmp, start, end) {
                continue;
            }
            if best.map_or(true, |b| seg.heat > st.segments[b].heat) {
                best = Some(i);
            }
        }
        best
    }

    fn first_hot_overlap(&self, st: &TableState, start: &[u8], end: &[u8]) -> Option<usize> {
        let cmp = self.comparator.as_ref();
        let mut best: Option<usize> = None;
        for (i, seg) in st.segments.iter().enumerate() {
            if !seg.valid || seg.heat < self.boiling_point || !seg.overlaps(cmp, start, end) {
                continue;
            }
            if best.map_or(true, |b| cmp.compare(&seg.start, &st.segments[b].start).is_lt()) {
                best = Some(i);
            }
        }
        best
    }

    /// Union a hot incoming range into an overlapping hot segment
    fn absorb_hot_range(&self, st: &mut TableState, index: usize, start: &[u8], end: &[u8], delta: i32) {
        let cmp = self.comparator.as_ref();
        let seg = &mut st.segments[index];
        if cmp.compare(start, &seg.start).is_lt() {
            seg.start = Bytes::copy_from_slice(start);
        }
        if cmp.compare(end, &seg.end).is_gt() {
            seg.end = Bytes::copy_from_slice(end);
        }
        seg.absorb_heat(delta);
        // the incoming range has never been migrated
        seg.in_fast_tier = false;
        tracing::debug!(index, heat = seg.heat, "hot range absorbed into overlapping segment");

        self.divide_or_coalesce(st, index);
    }

    /// Cold segment whose union with `[start, end]` is smallest
    ///
    /// Smaller union end wins, then larger union start, then lower index.
    fn smallest_cold_union(&self, st: &TableState, start: &[u8], end: &[u8]) -> Option<usize> {
        let cmp = self.comparator.as_ref();
        let mut best: Option<(usize, &[u8], &[u8])> = None;
        for (i, seg) in st.segments.iter().enumerate() {
            if !seg.valid || seg.heat >= self.boiling_point || !seg.overlaps(cmp, start, end) {
                continue;
            }
            let union_start = if cmp.compare(&seg.start, start).is_lt() { &seg.start[..] } else { start };
            let union_end = if cmp.compare(&seg.end, end).is_gt() { &seg.end[..] } else { end };

            let better = match best {
                None => true,
                Some((_, best_start, best_end)) => match cmp.compare(union_end, best_end) {
                    std::cmp::Ordering::Less => true,
                    std::cmp::Ordering::Equal => cmp.compare(union_start, best_start).is_gt(),
                    std::cmp::Ordering::Greater => false,
                },
            };
            if better {
                best = Some((i, union_start, union_end));
            }
        }
        best.map(|(i, _, _)| i)
    }

    /// Stretch a cold segment over `[start, end]` and add the delta
    fn widen_cold(&self, st: &mut TableState, index: usize, start: &[u8], end: &[u8], delta: i32) -> bool {
        let cmp = self.comparator.as_ref();
        let seg = &mut st.segments[index];
        let mut grew = false;
        if cmp.compare(start, &seg.start).is_lt() {
            seg.start = Bytes::copy_from_slice(start);
            grew = true;
        }
        if cmp.compare(end, &seg.end).is_gt() {
            seg.end = Bytes::copy_from_slice(end);
            grew = true;
        }

        let before = seg.heat;
        seg.absorb_heat(delta);
        if grew {
            seg.in_fast_tier = false;
        }
        let after = seg.heat;
        let crossed = self.crossed(before, after, seg.in_fast_tier);

        if before < self.boiling_point && after >= self.boiling_point {
            self.divide_or_coalesce(st, index);
        }
        crossed
    }

    fn insert_new(&self, st: &mut TableState, start: &[u8], end: &[u8], delta: i32) -> Result<bool> {
        if delta <= 0 {
            return Err(HeatError::Invariant(format!(
                "new segment needs a positive heat, got {}",
                delta
            )));
        }
        let heat = delta.min(HEAT_MAX);

        let slot = match (self.slot_policy, st.first_free()) {
            (_, None) => None,
            (SlotReusePolicy::FirstFree, free) => free,
            (SlotReusePolicy::ColderThanTracked, free) => match st.coldest() {
                Some(coldest) if heat < coldest => None,
                _ => free,
            },
        };
        let index = st.place(slot, Segment::new(start, end, heat));

        let hot = heat >= self.boiling_point;
        if hot {
            self.divide_or_coalesce(st, index);
        }
        Ok(hot)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Hottest valid segment containing `key`
    ///
    /// Ties keep the lower index.
    pub fn find_seg(&self, key: &[u8]) -> Option<SegmentHit> {
        let st = self.state.read();
        self.hottest_covering(&st, key).map(|i| st.segments[i].hit())
    }

    /// Like `find_seg`, also telling whether every key of the returned
    /// range resolves to the same side of the boiling point
    ///
    /// A hot hit always does: any key inside it is covered by a segment at
    /// least that hot. A cold hit does unless some hot segment overlaps it.
    pub fn find_seg_uniform(&self, key: &[u8]) -> Option<(SegmentHit, bool)> {
        let cmp = self.comparator.as_ref();
        let st = self.state.read();
        let seg = &st.segments[self.hottest_covering(&st, key)?];

        let uniform = seg.heat >= self.boiling_point
            || !st.segments.iter().any(|s| {
                s.valid && s.heat >= self.boiling_point && s.overlaps(cmp, &seg.start, &seg.end)
            });
        Some((seg.hit(), uniform))
    }

    fn hottest_covering(&self, st: &TableState, key: &[u8]) -> Option<usize> {
        let cmp = self.comparator.as_ref();
        let mut best: Option<usize> = None;
        for (i, seg) in st.segments.iter().enumerate() {
            if seg.valid
                && seg.contains_key(cmp, key)
                && best.map_or(true, |b| seg.heat > st.segments[b].heat)
            {
                best = Some(i);
            }
        }
        best
    }

    /// Ranges whose tier flag disagrees with their heat
    pub fn pending_migrations(&self) -> PendingMigrations {
        let st = self.state.read();
        let mut pending = PendingMigrations::default();
        for seg in st.segments.iter().filter(|s| s.valid) {
            if seg.in_fast_tier && seg.heat <= self.freezing_point {
                pending.demote.push(seg.range());
            }
            if !seg.in_fast_tier && seg.heat >= self.boiling_point {
                pending.promote.push(seg.range());
            }
        }
        pending
    }

    // =========================================================================
    // Tier Flags and Cooling
    // =========================================================================

    /// Set the tier flag of every segment lying inside `[start, end]`
    ///
    /// Returns the number of segments updated.
    pub fn change_in_lsm(&self, start: &[u8], end: &[u8], in_fast_tier: bool) -> usize {
        let cmp = self.comparator.as_ref();
        let (start, end) = if cmp.compare(start, end).is_gt() {
            (end, start)
        } else {
            (start, end)
        };

        let mut st = self.state.write();
        let mut changed = 0;
        for seg in st.segments.iter_mut().filter(|s| s.valid) {
            if cmp.compare(&seg.start, start).is_ge() && cmp.compare(&seg.end, end).is_le() {
                seg.in_fast_tier = in_fast_tier;
                changed += 1;
            }
        }
        changed
    }

    /// Multiply every heat by `factor`, truncating toward zero
    ///
    /// Segments that reach zero are freed. Returns the fast-tier ranges that
    /// dropped from above the freezing point to at or below it.
    ///
    /// # Errors
    ///
    /// `HeatError::Invariant` unless `0 < factor < 1`.
    pub fn cooling(&self, factor: f64) -> Result<Vec<KeyRange>> {
        if !(factor > 0.0 && factor < 1.0) {
            return Err(HeatError::Invariant(format!(
                "cooling factor must be in (0, 1), got {}",
                factor
            )));
        }

        let mut st = self.state.write();
        let mut frozen = Vec::new();
        let mut released = 0;
        for seg in st.segments.iter_mut().filter(|s| s.valid) {
            let before = seg.heat;
            seg.heat = (f64::from(before) * factor) as i32;
            if seg.in_fast_tier && before > self.freezing_point && seg.heat <= self.freezing_point {
                frozen.push(seg.range());
            }
            if seg.heat == 0 {
                *seg = Segment::default();
                released += 1;
            }
        }
        st.curr -= released;

        tracing::debug!(factor, frozen = frozen.len(), released, "cooling pass finished");
        Ok(frozen)
    }

    /// Merge every pair of overlapping hot segments
    ///
    /// Returns the number of segments absorbed.
    pub fn coalesce_hot_overlaps(&self) -> usize {
        let mut st = self.state.write();
        self.coalesce_all(&mut st)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write every valid segment to `path`
    ///
    /// The file is replaced atomically; a failed save leaves the previous
    /// file in place. Returns the number of records written.
    pub fn save_table(&self, path: &Path) -> Result<usize> {
        let mut buf = BytesMut::new();
        let written = {
            let st = self.state.read();
            persist::encode_segments(st.segments.iter(), &mut buf)?
        };
        persist::write_atomically(path, &buf)?;

        tracing::info!(records = written, path = %path.display(), "segment table saved");
        Ok(written)
    }

    /// Replace the table contents with the records stored at `path`
    ///
    /// Records fill the backing array from slot 0. On any error the table
    /// is left exactly as it was. Returns the number of records loaded.
    pub fn load_table(&self, path: &Path) -> Result<usize> {
        let mut segments = persist::read_segments(path, self.comparator.as_ref())?;
        let loaded = segments.len();
        if segments.len() < self.target_len {
            segments.resize(self.target_len, Segment::default());
        }

        let mut st = self.state.write();
        st.segments = segments;
        st.curr = loaded;

        tracing::info!(records = loaded, path = %path.display(), "segment table loaded");
        Ok(loaded)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Clones of all valid segments in array order
    pub fn snapshot(&self) -> Vec<Segment> {
        self.state.read().segments.iter().filter(|s| s.valid).cloned().collect()
    }

    /// Approximate heap and inline bytes held by valid segments
    pub fn memory_footprint(&self) -> usize {
        self.state
            .read()
            .segments
            .iter()
            .filter(|s| s.valid)
            .map(|s| mem::size_of::<Segment>() + s.start.len() + s.end.len())
            .sum()
    }

    /// Number of valid segments
    pub fn len(&self) -> usize {
        self.state.read().curr
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the backing array, free slots included
    pub fn capacity(&self) -> usize {
        self.state.read().segments.len()
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    pub fn boiling_point(&self) -> i32 {
        self.boiling_point
    }

    pub fn freezing_point(&self) -> i32 {
        self.freezing_point
    }

    pub fn comparator(&self) -> &Arc<dyn KeyComparator> {
        &self.comparator
    }
}
