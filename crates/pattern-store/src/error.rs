//! Error types for store operations.

use thiserror::Error;

use pattern_index::IndexError;
use pattern_types::{EntryId, Tier};

/// Errors that can occur during pattern store operations.
#[derive(Debug, Error)]
pub enum PatternError {
    /// Error from the underlying index (dimension mismatch, capacity).
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// A tier is at its configured maximum and eviction could not free
    /// a slot.
    #[error("Tier capacity reached: {tier:?} at {max}")]
    CapacityExceeded { tier: Tier, max: usize },

    /// Operation referenced an id present in neither tier.
    #[error("Unknown entry: {0}")]
    UnknownEntry(EntryId),

    /// Internal invariant violation. Must never occur in correct
    /// operation.
    #[error("Index corruption: {0}")]
    Corruption(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store error.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn test_error_display() {
        let err = PatternError::Index(IndexError::DimensionMismatch {
            expected: 384,
            actual: 3,
        });
        assert_eq!(err.to_string(), "Index error: Dimension mismatch: expected 384, got 3");

        let id = Ulid::new();
        let err = PatternError::UnknownEntry(id);
        assert_eq!(err.to_string(), format!("Unknown entry: {id}"));
    }

    #[test]
    fn test_index_error_converts() {
        fn fails() -> Result<(), PatternError> {
            Err(IndexError::CapacityExceeded(10))?;
            Ok(())
        }
        assert!(matches!(
            fails(),
            Err(PatternError::Index(IndexError::CapacityExceeded(10)))
        ));
    }
}
