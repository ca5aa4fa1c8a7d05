//! Store configuration.
//!
//! All knobs are fixed at construction time and immutable for the store's
//! lifetime. The numeric defaults mirror the tuning the store shipped
//! with; they are configuration, not law.

use serde::{Deserialize, Serialize};

/// Configuration for a `PatternStore` and its index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Embedding dimension. Every vector entering the store must match.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// HNSW branching factor (connections per node per layer).
    #[serde(default = "default_index_m")]
    pub index_m: usize,

    /// Beam width used when linking a new node into the graph.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Beam width used at query time.
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,

    /// Maximum entries in the short-term tier.
    #[serde(default = "default_max_short_term")]
    pub max_short_term: usize,

    /// Maximum entries in the long-term tier.
    #[serde(default = "default_max_long_term")]
    pub max_long_term: usize,

    /// Minimum usage count for promotion to long-term.
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: u32,

    /// Minimum quality for promotion to long-term.
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f32,

    /// Cosine similarity at or above which two vectors are considered
    /// the same pattern and merged.
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,

    /// Short-term entries older than this with fewer than two uses are
    /// pruned during consolidation.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

fn default_dimension() -> usize {
    384
}

fn default_index_m() -> usize {
    16
}

fn default_ef_construction() -> usize {
    200
}

fn default_ef_search() -> usize {
    100
}

fn default_max_short_term() -> usize {
    1000
}

fn default_max_long_term() -> usize {
    5000
}

fn default_promotion_threshold() -> u32 {
    3
}

fn default_quality_threshold() -> f32 {
    0.6
}

fn default_dedup_threshold() -> f32 {
    0.95
}

fn default_max_age_secs() -> u64 {
    24 * 60 * 60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            index_m: default_index_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            max_short_term: default_max_short_term(),
            max_long_term: default_max_long_term(),
            promotion_threshold: default_promotion_threshold(),
            quality_threshold: default_quality_threshold(),
            dedup_threshold: default_dedup_threshold(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl StoreConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("dimension must be > 0".to_string());
        }
        if self.index_m < 2 {
            return Err(format!("index_m must be >= 2, got {}", self.index_m));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err("ef_construction and ef_search must be > 0".to_string());
        }
        if self.max_short_term == 0 || self.max_long_term == 0 {
            return Err("tier capacities must be > 0".to_string());
        }
        if self.promotion_threshold == 0 {
            return Err("promotion_threshold must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(format!(
                "quality_threshold must be 0.0-1.0, got {}",
                self.quality_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.dedup_threshold) {
            return Err(format!(
                "dedup_threshold must be 0.0-1.0, got {}",
                self.dedup_threshold
            ));
        }
        if self.max_age_secs == 0 {
            return Err("max_age_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Total index capacity implied by the tier bounds.
    pub fn index_capacity(&self) -> usize {
        self.max_short_term + self.max_long_term
    }
}
