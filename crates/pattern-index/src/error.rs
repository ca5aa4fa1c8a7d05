//! Index error types.

use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Vector length does not match the configured dimension. Rejected
    /// before any state is touched.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The index holds its configured maximum number of live vectors.
    /// The caller must evict before inserting.
    #[error("Index capacity reached: {0}")]
    CapacityExceeded(usize),
}
