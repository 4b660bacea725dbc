//! Configuration for heatrange
//!
//! Centralized placement configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{HeatError, Result};
use crate::segment::HEAT_MAX;

/// Main configuration for a placement manager instance
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the persisted segment table
    /// Internal structure:
    ///   {data_dir}/
    ///     └── segtable.data    (persisted heat table)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Heat Table Configuration
    // -------------------------------------------------------------------------
    /// Target number of tracked segments before the table starts merging
    pub target_len: usize,

    /// Heat at or above which a range belongs in the fast tier
    pub boiling_point: i32,

    /// Heat at or below which a fast-tier range is demoted
    pub freezing_point: i32,

    /// How a new segment claims a free slot
    pub slot_policy: SlotReusePolicy,

    // -------------------------------------------------------------------------
    // Cooling Configuration
    // -------------------------------------------------------------------------
    /// Number of cooling ticks between two cooling passes
    pub cooling_period: i32,

    /// Multiplier applied to every heat on a cooling pass, in (0, 1)
    pub cooling_factor: f64,

    // -------------------------------------------------------------------------
    // Migration Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the bounded move-command queue created by `with_channel`
    pub move_queue_capacity: usize,
}

/// Free-slot reuse policy for newly tracked ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotReusePolicy {
    /// Always reuse the lowest-index free slot; append only when none is free
    #[default]
    FirstFree,

    /// Reuse a free slot only when the new heat is not lower than the
    /// coldest tracked segment; otherwise append past the target length
    ColderThanTracked,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./heatrange_data"),
            target_len: 1024,
            boiling_point: 10,
            freezing_point: 3,
            slot_policy: SlotReusePolicy::FirstFree,
            cooling_period: 10,
            cooling_factor: 0.1,
            move_queue_capacity: 1024,
        }
    }
}

impl PlacementConfig {
    /// Create a new config builder
    pub fn builder() -> PlacementConfigBuilder {
        PlacementConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `HeatError::Config` naming the first offending field
    pub fn validate(&self) -> Result<()> {
        if self.target_len == 0 {
            return Err(HeatError::Config("target_len must be >= 1".into()));
        }
        if self.freezing_point < 0 || self.boiling_point > HEAT_MAX {
            return Err(HeatError::Config(format!(
                "thresholds must lie within [0, {}], got freezing={} boiling={}",
                HEAT_MAX, self.freezing_point, self.boiling_point
            )));
        }
        if self.boiling_point < self.freezing_point {
            return Err(HeatError::Config(format!(
                "boiling_point ({}) must be >= freezing_point ({})",
                self.boiling_point, self.freezing_point
            )));
        }
        if self.cooling_period < 1 {
            return Err(HeatError::Config("cooling_period must be >= 1".into()));
        }
        if !(self.cooling_factor > 0.0 && self.cooling_factor < 1.0) {
            return Err(HeatError::Config(format!(
                "cooling_factor must be in (0, 1), got {}",
                self.cooling_factor
            )));
        }
        if self.move_queue_capacity == 0 {
            return Err(HeatError::Config("move_queue_capacity must be >= 1".into()));
        }
        Ok(())
    }
}

/// Builder for PlacementConfig
#[derive(Default)]
pub struct PlacementConfigBuilder {
    config: PlacementConfig,
}

impl PlacementConfigBuilder {
    /// Set the data directory (where segtable.data lives)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the target table length
    pub fn target_len(mut self, len: usize) -> Self {
        self.config.target_len = len;
        self
    }

    /// Set the promotion threshold
    pub fn boiling_point(mut self, heat: i32) -> Self {
        self.config.boiling_point = heat;
        self
    }

    /// Set the demotion threshold
    pub fn freezing_point(mut self, heat: i32) -> Self {
        self.config.freezing_point = heat;
        self
    }

    /// Set the free-slot reuse policy
    pub fn slot_policy(mut self, policy: SlotReusePolicy) -> Self {
        self.config.slot_policy = policy;
        self
    }

    /// Set the number of ticks between cooling passes
    pub fn cooling_period(mut self, ticks: i32) -> Self {
        self.config.cooling_period = ticks;
        self
    }

    /// Set the cooling multiplier
    pub fn cooling_factor(mut self, factor: f64) -> Self {
        self.config.cooling_factor = factor;
        self
    }

    /// Set the move-command queue capacity
    pub fn move_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.move_queue_capacity = capacity;
        self
    }

    pub fn build(self) -> PlacementConfig {
        self.config
    }
}
