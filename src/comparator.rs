//! Key comparators
//!
//! Every range endpoint and point lookup in the table is ordered through a
//! [`KeyComparator`]. Engines that append a version/timestamp suffix to user
//! keys use [`PureKeyComparator`] so that all versions of a key land in the
//! same range.

use std::cmp::Ordering;
use std::fmt;

/// Total order over raw keys
pub trait KeyComparator: Send + Sync + fmt::Debug {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Plain lexicographic byte order
#[derive(Debug, Default, Clone, Copy)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Lexicographic order after stripping a fixed-width version suffix
///
/// Keys shorter than the suffix carry no version and are compared whole.
#[derive(Debug, Clone, Copy)]
pub struct PureKeyComparator {
    suffix_len: usize,
}

impl PureKeyComparator {
    /// Width of the big-endian commit timestamp appended to versioned keys
    pub const DEFAULT_SUFFIX_LEN: usize = 8;

    pub fn new(suffix_len: usize) -> Self {
        Self { suffix_len }
    }

    /// The user-visible part of a versioned key
    pub fn strip<'a>(&self, key: &'a [u8]) -> &'a [u8] {
        if key.len() >= self.suffix_len {
            &key[..key.len() - self.suffix_len]
        } else {
            key
        }
    }
}

impl Default for PureKeyComparator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SUFFIX_LEN)
    }
}

impl KeyComparator for PureKeyComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.strip(a).cmp(self.strip(b))
    }
}
