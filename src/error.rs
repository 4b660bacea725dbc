//! Error types for heatrange
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using HeatError
pub type Result<T> = std::result::Result<T, HeatError>;

/// Unified error type for heat table and placement operations
#[derive(Debug, Error)]
pub enum HeatError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Invariant Errors
    // -------------------------------------------------------------------------
    /// Caller bug: the request would corrupt the range index, nothing was changed
    #[error("Invariant violation: {0}")]
    Invariant(String),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Segment table corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
