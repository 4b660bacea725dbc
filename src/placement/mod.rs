//! Placement Module
//!
//! Decides which tier a key belongs to and asks the engine to migrate
//! ranges whose heat crosses a threshold.
//!
//! ## Responsibilities
//! - Answer "fast tier or slow tier?" for point keys (cache, then table)
//! - Feed access heat into the table
//! - Emit move commands on threshold crossings and cooling passes
//! - Checkpoint and restore the table
//!
//! ## Data Flow
//! ```text
//!   engine read/write path
//!            │
//!            ▼
//!   ┌─────────────────┐  hit   ┌─────────────┐
//!   │ PlacementManager├───────►│ RangeCache  │
//!   └────────┬────────┘        └─────────────┘
//!            │ miss / record
//!            ▼
//!   ┌─────────────────┐ crossing ┌──────────────┐
//!   │    HeatTable    ├─────────►│   MoveSink   │──► engine migration queue
//!   └─────────────────┘          └──────────────┘
//! ```

mod cache;
mod cooldown;
mod manager;

pub use cache::RangeCache;
pub use cooldown::CoolingGate;
pub use manager::PlacementManager;

use bytes::Bytes;
use crossbeam::channel::{Sender, TrySendError};

/// Request for the engine to migrate a key range between tiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub start: Bytes,
    pub end: Bytes,
    /// True moves the range into the fast (LSM) tier, false into the value log
    pub to_fast_tier: bool,
}

/// Destination for move commands
///
/// `enqueue` must not block; the manager never waits on a migration.
pub trait MoveSink: Send + Sync {
    fn enqueue(&self, command: MoveCommand);
}

impl MoveSink for Sender<MoveCommand> {
    fn enqueue(&self, command: MoveCommand) {
        match self.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                tracing::warn!(to_fast_tier = cmd.to_fast_tier, "move queue full, dropping command");
            }
            Err(TrySendError::Disconnected(cmd)) => {
                tracing::warn!(to_fast_tier = cmd.to_fast_tier, "move queue disconnected, dropping command");
            }
        }
    }
}
