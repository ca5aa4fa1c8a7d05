//! Pattern entry types and quality accounting.
//!
//! A `PatternEntry` owns its embedding vector plus the usage/quality
//! statistics that drive promotion and pruning. Entries are mutated only
//! through the accessors here so the counter invariants
//! (`usage_count >= success_count`, `quality` in [0,1]) hold everywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Stable opaque identifier for a pattern entry.
pub type EntryId = Ulid;

/// Opaque caller-defined metadata bag. The store never interprets its
/// contents.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Which tier map currently holds an entry. Derived from map membership,
/// never stored redundantly on the entry itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    ShortTerm,
    LongTerm,
}

/// Outcome of an insert: whether a new entry was created or a
/// near-duplicate was folded into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreAction {
    Created,
    Updated,
}

/// Receipt returned by `PatternStore::insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreReceipt {
    pub id: EntryId,
    pub action: StoreAction,
}

/// A stored embedding with its usage and quality statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternEntry {
    /// Unique id, generated at creation, stable for the entry lifetime.
    pub id: EntryId,

    /// The embedding vector. Immutable once stored.
    pub vector: Vec<f32>,

    /// Free-form classification tag (e.g. "security", "testing").
    pub domain: String,

    /// Quality score in [0,1], recomputed whenever the counters change.
    pub quality: f32,

    /// Times this pattern was used or matched. Non-decreasing.
    pub usage_count: u32,

    /// Successful outcomes reported. Never exceeds `usage_count`.
    pub success_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Caller-defined metadata, not interpreted by the store.
    #[serde(default)]
    pub metadata: Metadata,
}

impl PatternEntry {
    /// Create a fresh entry with one recorded usage and neutral quality.
    pub fn new(vector: Vec<f32>, domain: impl Into<String>, metadata: Metadata) -> Self {
        let now = Utc::now();
        Self {
            id: Ulid::new(),
            vector,
            domain: domain.into(),
            quality: 0.5,
            usage_count: 1,
            success_count: 0,
            created_at: now,
            updated_at: now,
            metadata,
        }
    }

    /// Record one more use of this pattern (a dedup match counts as a
    /// use). Quality is recomputed from the new counters.
    pub fn record_usage(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
        self.quality = Self::compute_quality(self.usage_count, self.success_count);
        self.updated_at = Utc::now();
    }

    /// Record an outcome and recompute quality.
    ///
    /// Quality is `0.3 + 0.7 * success_rate`, clamped to [0,1]; an entry
    /// with zero usage sits at the neutral 0.5.
    pub fn record_outcome(&mut self, success: bool) {
        self.usage_count = self.usage_count.saturating_add(1);
        if success {
            self.success_count = self.success_count.saturating_add(1);
        }
        self.quality = Self::compute_quality(self.usage_count, self.success_count);
        self.updated_at = Utc::now();
    }

    /// Fold another entry's counters into this one (dedup merge).
    /// The other entry is deleted by the caller afterwards.
    pub fn absorb(&mut self, other: &PatternEntry) {
        self.usage_count = self.usage_count.saturating_add(other.usage_count);
        self.success_count = self.success_count.saturating_add(other.success_count);
        self.quality = Self::compute_quality(self.usage_count, self.success_count);
        self.updated_at = Utc::now();
    }

    /// Deterministic quality formula given the two counters.
    pub fn compute_quality(usage_count: u32, success_count: u32) -> f32 {
        if usage_count == 0 {
            return 0.5;
        }
        let rate = success_count as f32 / usage_count as f32;
        (0.3 + 0.7 * rate).clamp(0.0, 1.0)
    }

    /// Age of the entry relative to `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(vector: Vec<f32>) -> PatternEntry {
        PatternEntry::new(vector, "testing", Metadata::new())
    }

    #[test]
    fn test_new_entry_defaults() {
        let e = entry(vec![1.0, 0.0]);
        assert_eq!(e.usage_count, 1);
        assert_eq!(e.success_count, 0);
        assert_eq!(e.quality, 0.5);
        assert_eq!(e.created_at, e.updated_at);
    }

    #[test]
    fn test_quality_formula() {
        assert_eq!(PatternEntry::compute_quality(0, 0), 0.5);
        assert!((PatternEntry::compute_quality(3, 3) - 1.0).abs() < 1e-6);
        assert!((PatternEntry::compute_quality(4, 2) - 0.65).abs() < 1e-6);
        assert!((PatternEntry::compute_quality(10, 0) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_record_usage_recomputes_quality() {
        let mut e = entry(vec![1.0]);
        assert_eq!(e.quality, 0.5);
        e.record_usage();
        assert_eq!(e.usage_count, 2);
        assert_eq!(e.quality, PatternEntry::compute_quality(2, 0));
    }

    #[test]
    fn test_record_outcome_updates_counters() {
        let mut e = entry(vec![1.0]);
        e.record_outcome(true);
        assert_eq!(e.usage_count, 2);
        assert_eq!(e.success_count, 1);
        e.record_outcome(false);
        assert_eq!(e.usage_count, 3);
        assert_eq!(e.success_count, 1);
        assert!(e.usage_count >= e.success_count);
    }

    #[test]
    fn test_usage_count_monotonic() {
        let mut e = entry(vec![1.0]);
        let mut last = e.usage_count;
        for i in 0..10 {
            if i % 2 == 0 {
                e.record_usage();
            } else {
                e.record_outcome(i % 3 == 0);
            }
            assert!(e.usage_count >= last);
            last = e.usage_count;
        }
    }

    #[test]
    fn test_absorb_folds_counters() {
        let mut a = entry(vec![1.0]);
        let mut b = entry(vec![1.0]);
        b.record_outcome(true);
        b.record_outcome(true);
        a.absorb(&b);
        assert_eq!(a.usage_count, 1 + 3);
        assert_eq!(a.success_count, 2);
        assert_eq!(a.quality, PatternEntry::compute_quality(4, 2));
    }

    #[test]
    fn test_quality_stays_in_range() {
        for usage in 0..20u32 {
            for success in 0..=usage {
                let q = PatternEntry::compute_quality(usage, success);
                assert!((0.0..=1.0).contains(&q));
            }
        }
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut meta = Metadata::new();
        meta.insert("source".into(), serde_json::json!("unit-test"));
        let e = PatternEntry::new(vec![0.1, 0.2, 0.3], "security", meta);
        let json = serde_json::to_string(&e).unwrap();
        let parsed: PatternEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, e);
    }
}
