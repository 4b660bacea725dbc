//! Segment table codec
//!
//! Encoding and decoding functions for the persisted table format.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::comparator::KeyComparator;
use crate::error::{HeatError, Result};
use crate::segment::{Segment, HEAT_MAX};

/// Longest key a one-byte length prefix can describe
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Fixed bytes per record: heat + tier + two length prefixes
const RECORD_OVERHEAD: usize = 4;

const TIER_SLOW: u8 = 0;
const TIER_FAST: u8 = 1;

// =============================================================================
// Encoding
// =============================================================================

/// Append every valid segment to `buf`
///
/// Invalid slots are skipped. Heat is capped at `HEAT_MAX`. Returns the
/// number of records written; on error `buf` is left as it was.
pub fn encode_segments<'a, I>(segments: I, buf: &mut BytesMut) -> Result<usize>
where
    I: IntoIterator<Item = &'a Segment>,
{
    let mark = buf.len();
    let mut written = 0;

    for seg in segments.into_iter().filter(|s| s.valid) {
        if seg.start.len() > MAX_KEY_LEN || seg.end.len() > MAX_KEY_LEN {
            buf.truncate(mark);
            return Err(HeatError::Invariant(format!(
                "segment key of {} bytes exceeds the persistable limit of {}",
                seg.start.len().max(seg.end.len()),
                MAX_KEY_LEN
            )));
        }

        buf.reserve(RECORD_OVERHEAD + seg.start.len() + seg.end.len());
        buf.put_u8(seg.heat.clamp(0, HEAT_MAX) as u8);
        buf.put_u8(if seg.in_fast_tier { TIER_FAST } else { TIER_SLOW });
        buf.put_u8(seg.start.len() as u8);
        buf.put_slice(&seg.start);
        buf.put_u8(seg.end.len() as u8);
        buf.put_slice(&seg.end);
        written += 1;
    }

    Ok(written)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode records until `data` is exhausted
///
/// Every returned segment is valid and owns its keys.
pub fn decode_segments(data: &[u8], cmp: &dyn KeyComparator) -> Result<Vec<Segment>> {
    let mut cursor = data;
    let mut segments = Vec::new();

    while cursor.has_remaining() {
        let offset = data.len() - cursor.remaining();
        segments.push(decode_record(&mut cursor, offset, cmp)?);
    }

    Ok(segments)
}

/// Decode one record starting at byte `offset` of the file
fn decode_record(cursor: &mut &[u8], offset: usize, cmp: &dyn KeyComparator) -> Result<Segment> {
    ensure_remaining(cursor, 3, offset, "record header")?;
    let heat = i32::from(cursor.get_u8()).min(HEAT_MAX);
    let in_fast_tier = match cursor.get_u8() {
        TIER_SLOW => false,
        TIER_FAST => true,
        other => {
            return Err(HeatError::Corruption(format!(
                "invalid tier flag {} in record at offset {}",
                other, offset
            )))
        }
    };

    let start = read_key(cursor, offset, "start key")?;
    ensure_remaining(cursor, 1, offset, "end key length")?;
    let end = read_key(cursor, offset, "end key")?;

    if heat == 0 {
        return Err(HeatError::Corruption(format!(
            "record at offset {} has zero heat",
            offset
        )));
    }
    if cmp.compare(&start, &end).is_gt() {
        return Err(HeatError::Corruption(format!(
            "record at offset {} has start after end",
            offset
        )));
    }

    Ok(Segment {
        start,
        end,
        heat,
        in_fast_tier,
        valid: true,
    })
}

/// Read a length-prefixed key; the length byte must already be available
fn read_key(cursor: &mut &[u8], offset: usize, what: &str) -> Result<Bytes> {
    let len = usize::from(cursor.get_u8());
    ensure_remaining(cursor, len, offset, what)?;
    Ok(cursor.copy_to_bytes(len))
}

fn ensure_remaining(cursor: &&[u8], needed: usize, offset: usize, what: &str) -> Result<()> {
    if cursor.remaining() < needed {
        return Err(HeatError::Corruption(format!(
            "truncated {} in record at offset {}: need {} bytes, {} left",
            what,
            offset,
            needed,
            cursor.remaining()
        )));
    }
    Ok(())
}
