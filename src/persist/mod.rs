//! Persistence Module
//!
//! Binary save/restore of the heat table.
//!
//! ## Responsibilities
//! - Encode valid segments in array order
//! - Decode records back into segments, rejecting corrupt input
//! - Replace the table file atomically on save
//!
//! ## File Format
//! No header and no record count; records run until end of file.
//! ```text
//! ┌──────────┬──────────┬───────────┬───────────┬─────────┬─────────┐
//! │ Heat (1) │ Tier (1) │StartLen(1)│   Start   │EndLen(1)│   End   │
//! └──────────┴──────────┴───────────┴───────────┴─────────┴─────────┘
//! ... (repeated for each valid segment)
//! ```
//! Tier is 0 (slow tier) or 1 (fast tier).

mod codec;

pub use codec::{decode_segments, encode_segments, MAX_KEY_LEN};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::comparator::KeyComparator;
use crate::error::Result;
use crate::segment::Segment;

/// File name of the persisted table inside the data directory
pub const SEGTABLE_FILENAME: &str = "segtable.data";

/// Read and decode a table file
pub fn read_segments(path: &Path, cmp: &dyn KeyComparator) -> Result<Vec<Segment>> {
    let data = fs::read(path)?;
    decode_segments(&data, cmp)
}

/// Write `data` to `path` through a synced temporary file and a rename
pub fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = temp_path(path);

    let result = (|| -> Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        // leave only the previous file behind
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// "segtable.data" → "segtable.data.tmp"
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
