//! Divide and coalesce
//!
//! Restores the rule that hot segments do not overlap. Every helper here
//! expects the caller to hold the table write lock.

use std::mem;

use super::table::{HeatTable, TableState};
use super::{Segment, HEAT_MAX};

impl HeatTable {
    /// Resolve overlaps between the hot segment at `index` and its hot
    /// neighbours.
    ///
    /// A single neighbour is divided while the table is within its target
    /// length; anything else is coalesced into `index`.
    pub(super) fn divide_or_coalesce(&self, st: &mut TableState, index: usize) {
        let neighbours = self.hot_neighbours(st, index);
        match neighbours.as_slice() {
            [] => {}
            [other] if st.curr <= self.target_len => self.divide(st, index, *other),
            _ => {
                self.coalesce(st, index);
            }
        }
    }

    /// Merge the table's hot overlaps, visiting segments by start key
    pub(super) fn coalesce_all(&self, st: &mut TableState) -> usize {
        let cmp = self.comparator.as_ref();
        let mut order: Vec<usize> = st
            .segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.valid && s.heat >= self.boiling_point)
            .map(|(i, _)| i)
            .collect();
        order.sort_by(|&a, &b| {
            cmp.compare(&st.segments[a].start, &st.segments[b].start)
                .then(a.cmp(&b))
        });

        let mut absorbed = 0;
        for index in order {
            // may have been swallowed by an earlier segment
            if st.segments[index].valid {
                absorbed += self.coalesce(st, index);
            }
        }
        absorbed
    }

    /// Valid hot segments overlapping `index`, sorted by start key then index
    fn hot_neighbours(&self, st: &TableState, index: usize) -> Vec<usize> {
        let cmp = self.comparator.as_ref();
        let target = &st.segments[index];

        let mut found: Vec<usize> = st
            .segments
            .iter()
            .enumerate()
            .filter(|(i, s)| {
                *i != index
                    && s.valid
                    && s.heat >= self.boiling_point
                    && s.overlaps(cmp, &target.start, &target.end)
            })
            .map(|(i, _)| i)
            .collect();
        found.sort_by(|&a, &b| {
            cmp.compare(&st.segments[a].start, &st.segments[b].start)
                .then(a.cmp(&b))
        });
        found
    }

    /// Absorb hot neighbours into `index` until none overlaps it
    ///
    /// Each expansion can reach new neighbours, so the neighbour list is
    /// rebuilt until it comes back empty. Returns the number absorbed.
    fn coalesce(&self, st: &mut TableState, index: usize) -> usize {
        let mut absorbed = 0;
        loop {
            let work = self.hot_neighbours(st, index);
            if work.is_empty() {
                break;
            }
            for other in work {
                self.expand(st, index, other);
                absorbed += 1;
            }
        }
        if absorbed > 0 {
            let seg = &st.segments[index];
            tracing::debug!(index, absorbed, heat = seg.heat, "hot segments coalesced");
        }
        absorbed
    }

    /// Union `from` into `into` and free `from`
    ///
    /// Heat is summed (capped); the tier flag survives only if both were
    /// in the fast tier.
    fn expand(&self, st: &mut TableState, into: usize, from: usize) {
        let cmp = self.comparator.as_ref();
        let absorbed = st.release(from);

        let seg = &mut st.segments[into];
        if cmp.compare(&absorbed.start, &seg.start).is_lt() {
            seg.start = absorbed.start;
        }
        if cmp.compare(&absorbed.end, &seg.end).is_gt() {
            seg.end = absorbed.end;
        }
        seg.absorb_heat(absorbed.heat);
        seg.in_fast_tier &= absorbed.in_fast_tier;
    }

    /// Split two overlapping hot segments into three
    ///
    /// The intersection becomes a new segment holding the summed heat;
    /// `a` and `b` shrink to the parts on either side of it. When one
    /// segment contains the other, the right-hand remainder comes from the
    /// container, so it takes the container's heat and tier flag.
    fn divide(&self, st: &mut TableState, a: usize, b: usize) {
        let cmp = self.comparator.as_ref();
        let mut seg_a = st.segments[a].clone();
        let mut seg_b = st.segments[b].clone();

        let mut inter = Segment {
            start: Default::default(),
            end: Default::default(),
            heat: seg_a.heat.saturating_add(seg_b.heat).min(HEAT_MAX),
            in_fast_tier: seg_a.in_fast_tier && seg_b.in_fast_tier,
            valid: true,
        };

        let a_starts_first = cmp.compare(&seg_a.start, &seg_b.start).is_le();
        let a_ends_first = cmp.compare(&seg_a.end, &seg_b.end).is_le();
        match (a_starts_first, a_ends_first) {
            // a=[sa,ea] b=[sb,eb], sa <= sb <= ea <= eb
            (true, true) => {
                inter.start = seg_b.start.clone();
                inter.end = seg_a.end.clone();
                let a_end = mem::replace(&mut seg_a.end, seg_b.start.clone());
                seg_b.start = a_end;
            }
            // a contains b
            (true, false) => {
                inter.start = seg_b.start.clone();
                inter.end = seg_b.end.clone();
                let a_end = mem::replace(&mut seg_a.end, seg_b.start.clone());
                seg_b.start = mem::replace(&mut seg_b.end, a_end);
                seg_b.heat = seg_a.heat;
                seg_b.in_fast_tier = seg_a.in_fast_tier;
            }
            // sb < sa <= eb < ea
            (false, false) => {
                inter.start = seg_a.start.clone();
                inter.end = seg_b.end.clone();
                let b_end = mem::replace(&mut seg_b.end, seg_a.start.clone());
                seg_a.start = b_end;
            }
            // b contains a
            (false, true) => {
                inter.start = seg_a.start.clone();
                inter.end = seg_a.end.clone();
                let b_end = mem::replace(&mut seg_b.end, seg_a.start.clone());
                seg_a.start = mem::replace(&mut seg_a.end, b_end);
                seg_a.heat = seg_b.heat;
                seg_a.in_fast_tier = seg_b.in_fast_tier;
            }
        }

        st.segments[a] = seg_a;
        st.segments[b] = seg_b;
        let inter_index = st.allocate(inter);

        // a remainder squeezed down to the intersection's boundary key adds nothing
        for index in [a, b] {
            if self.is_covered_point(st, index, inter_index) {
                st.release(index);
            }
        }

        tracing::debug!(a, b, inter_index, heat = st.segments[inter_index].heat, "hot segments divided");
    }

    fn is_covered_point(&self, st: &TableState, index: usize, inter_index: usize) -> bool {
        let cmp = self.comparator.as_ref();
        let seg = &st.segments[index];
        let inter = &st.segments[inter_index];
        cmp.compare(&seg.start, &seg.end).is_eq()
            && (cmp.compare(&seg.start, &inter.start).is_eq() || cmp.compare(&seg.start, &inter.end).is_eq())
    }
}
