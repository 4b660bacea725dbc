//! # heatrange
//!
//! The hot/cold range index of a hybrid key-value engine:
//! - Tracks access heat per key range in a bounded interval table
//! - Keeps hot ranges non-overlapping by dividing or coalescing them
//! - Decays heat on periodic cooling passes
//! - Asks the engine to migrate ranges between the LSM and the value log
//! - Persists the table in a compact binary format
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Storage Engine (reads, writes, scans)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ should_store_in_fast_tier / record_access
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   PlacementManager                           │
//! │          (RangeCache, CoolingGate, MoveSink)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  HeatTable  │          │ MoveCommand │──► engine migration queue
//!   │  (RwLock)   │          │   channel   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │   Persist   │
//!   │ (segtable)  │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod comparator;

pub mod segment;
pub mod persist;
pub mod placement;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{HeatError, Result};
pub use config::{PlacementConfig, SlotReusePolicy};
pub use comparator::{BytewiseComparator, KeyComparator, PureKeyComparator};
pub use segment::{HeatTable, KeyRange, Segment, SegmentHit, HEAT_MAX};
pub use placement::{MoveCommand, MoveSink, PlacementManager};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of heatrange
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
