//! Export/import snapshot format.
//!
//! A snapshot carries only the entries, never the index graph: layer
//! assignment is randomized, so a restored store rebuilds the index from
//! scratch instead of trusting persisted graph structure.

use serde::{Deserialize, Serialize};

use crate::entry::PatternEntry;

/// Full dump of both tiers, suitable for backup and restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub short_term: Vec<PatternEntry>,
    pub long_term: Vec<PatternEntry>,
}

impl StoreSnapshot {
    pub fn len(&self) -> usize {
        self.short_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty() && self.long_term.is_empty()
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
