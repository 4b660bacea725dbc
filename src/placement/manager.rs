//! Placement Manager
//!
//! Wraps the heat table with a lookup cache, a cooling trigger and the
//! engine's move-command sink.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver};

use crate::comparator::KeyComparator;
use crate::config::PlacementConfig;
use crate::error::Result;
use crate::persist::SEGTABLE_FILENAME;
use crate::segment::{HeatTable, KeyRange};

use super::{CoolingGate, MoveCommand, MoveSink, RangeCache};

/// Tier placement for one storage-engine instance
///
/// ## Concurrency Model
///
/// Every method takes `&self` and runs to completion on the caller's
/// thread. The table and the cache each own an RwLock; the cache lock is
/// always released before the table is consulted, so the two never nest.
/// Cooling is gated by an atomic counter and needs no lock of its own.
pub struct PlacementManager {
    config: PlacementConfig,
    comparator: Arc<dyn KeyComparator>,
    table: HeatTable,
    cache: RangeCache,
    gate: CoolingGate,
    sink: Arc<dyn MoveSink>,
}

impl PlacementManager {
    /// Create a manager with an empty table
    pub fn new(
        config: PlacementConfig,
        comparator: Arc<dyn KeyComparator>,
        sink: Arc<dyn MoveSink>,
    ) -> Result<Self> {
        let table = HeatTable::from_config(&config, Arc::clone(&comparator))?;
        let cache = RangeCache::new(Arc::clone(&comparator));
        let gate = CoolingGate::new(config.cooling_period);

        Ok(Self {
            config,
            comparator,
            table,
            cache,
            gate,
            sink,
        })
    }

    /// Create a manager feeding a bounded crossbeam queue
    ///
    /// The engine's migration worker drains the returned receiver.
    pub fn with_channel(
        config: PlacementConfig,
        comparator: Arc<dyn KeyComparator>,
    ) -> Result<(Self, Receiver<MoveCommand>)> {
        let (tx, rx) = channel::bounded(config.move_queue_capacity);
        let manager = Self::new(config, comparator, Arc::new(tx))?;
        Ok((manager, rx))
    }

    /// Create a manager and restore the persisted table if one exists
    pub fn open(
        config: PlacementConfig,
        comparator: Arc<dyn KeyComparator>,
        sink: Arc<dyn MoveSink>,
    ) -> Result<Self> {
        let manager = Self::new(config, comparator, sink)?;
        if manager.table_path().exists() {
            manager.load_state()?;
        }
        Ok(manager)
    }

    // =========================================================================
    // Engine Hooks
    // =========================================================================

    /// Whether data under `key` belongs in the fast tier
    ///
    /// Unknown keys default to the slow tier.
    pub fn should_store_in_fast_tier(&self, key: &[u8]) -> bool {
        if let Some(in_fast_tier) = self.cache.lookup(key) {
            tracing::trace!("placement cache hit");
            return in_fast_tier;
        }

        let generation = self.cache.generation();
        match self.table.find_seg_uniform(key) {
            None => false,
            Some((hit, uniform)) => {
                let in_fast_tier = hit.heat >= self.config.boiling_point;
                // a cold range with a hot segment inside it answers
                // differently for different keys
                if uniform {
                    self.cache.refresh(generation, hit.start, hit.end, in_fast_tier);
                }
                in_fast_tier
            }
        }
    }

    /// Add access heat to `[start, end]` and request a migration if the
    /// range crossed a threshold
    ///
    /// Positive heat requests a move into the fast tier, negative heat a
    /// move out of it. Reversed endpoints are swapped.
    pub fn record_access(&self, start: &[u8], end: &[u8], heat_delta: i32) -> Result<()> {
        let (start, end) = self.ordered(start, end);
        let (crossed, span) = self.table.store_seg_span(start, end, heat_delta)?;
        // heat can pass the boiling point without a reported crossing
        self.cache.invalidate_overlapping(&span.start, &span.end);
        if crossed {
            self.emit(
                Bytes::copy_from_slice(start),
                Bytes::copy_from_slice(end),
                heat_delta > 0,
            );
        }
        Ok(())
    }

    /// Record that a migration of `[start, end]` has physically completed
    ///
    /// Returns the number of segments whose flag changed.
    pub fn set_tier_flag(&self, start: &[u8], end: &[u8], in_fast_tier: bool) -> usize {
        let (start, end) = self.ordered(start, end);
        self.table.change_in_lsm(start, end, in_fast_tier)
    }

    /// Count one cooling tick; every `cooling_period` ticks run a pass
    ///
    /// Returns true when this call ran the cooling pass.
    pub fn trigger_cool_tick(&self) -> Result<bool> {
        if !self.gate.tick() {
            return Ok(false);
        }
        self.cool(self.config.cooling_factor)?;
        Ok(true)
    }

    /// Run one cooling pass and demote every range that froze
    ///
    /// Returns the number of demotions requested.
    pub fn cool(&self, factor: f64) -> Result<usize> {
        let frozen = self.table.cooling(factor)?;
        self.cache.clear();

        let count = frozen.len();
        for KeyRange { start, end } in frozen {
            self.emit(start, end, false);
        }
        Ok(count)
    }

    /// Request a migration for every range whose tier disagrees with its heat
    ///
    /// Returns the number of commands emitted.
    pub fn flush_pending(&self) -> usize {
        let pending = self.table.pending_migrations();
        let count = pending.demote.len() + pending.promote.len();
        for KeyRange { start, end } in pending.demote {
            self.emit(start, end, false);
        }
        for KeyRange { start, end } in pending.promote {
            self.emit(start, end, true);
        }
        count
    }

    // =========================================================================
    // Checkpointing
    // =========================================================================

    /// Persist the table under the data directory
    pub fn save_state(&self) -> Result<usize> {
        fs::create_dir_all(&self.config.data_dir)?;
        self.table.save_table(&self.table_path())
    }

    /// Replace the table with the persisted one
    pub fn load_state(&self) -> Result<usize> {
        let loaded = self.table.load_table(&self.table_path())?;
        self.cache.clear();
        Ok(loaded)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ordered<'a>(&self, start: &'a [u8], end: &'a [u8]) -> (&'a [u8], &'a [u8]) {
        if self.comparator.compare(start, end).is_gt() {
            (end, start)
        } else {
            (start, end)
        }
    }

    fn emit(&self, start: Bytes, end: Bytes, to_fast_tier: bool) {
        tracing::debug!(
            start = ?start,
            end = ?end,
            to_fast_tier,
            "requesting range migration"
        );
        self.sink.enqueue(MoveCommand {
            start,
            end,
            to_fast_tier,
        });
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Path of the persisted table file
    pub fn table_path(&self) -> PathBuf {
        self.config.data_dir.join(SEGTABLE_FILENAME)
    }

    pub fn table(&self) -> &HeatTable {
        &self.table
    }

    pub fn cache(&self) -> &RangeCache {
        &self.cache
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }
}
