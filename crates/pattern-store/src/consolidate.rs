//! Periodic maintenance: dedup, prune, promote.
//!
//! `consolidate` is the only operation whose cost scales with tier
//! size. The pairwise dedup scan covers the short-term tier only, so
//! the worst case is bounded by `max_short_term`²; long-term entries
//! are never re-scanned once promoted. The pass is checkpointable: a
//! cancel probe is consulted between pairwise comparisons so a shutdown
//! never waits on a full scan.

use chrono::{Duration, Utc};
use tracing::{debug, info};

use pattern_types::EntryId;

use crate::store::PatternStore;

/// What a consolidation pass accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidateReport {
    pub duplicates_removed: usize,
    pub patterns_pruned: usize,
    pub patterns_promoted: usize,
}

impl ConsolidateReport {
    pub fn is_empty(&self) -> bool {
        self.duplicates_removed == 0 && self.patterns_pruned == 0 && self.patterns_promoted == 0
    }
}

/// Ratio of tombstones to live nodes above which the index is
/// physically rebuilt at the end of a pass.
const REBUILD_TOMBSTONE_RATIO: f64 = 0.5;

impl PatternStore {
    /// Run a full maintenance pass: dedup short-term near-duplicates,
    /// prune aged low-usage entries, then promote everything eligible.
    pub fn consolidate(&mut self) -> ConsolidateReport {
        self.consolidate_with(|| false)
    }

    /// Maintenance pass with a cancel probe. When `cancelled` returns
    /// true the pass stops at the next checkpoint and reports what it
    /// finished; the store is left consistent.
    pub fn consolidate_with<F: Fn() -> bool>(&mut self, cancelled: F) -> ConsolidateReport {
        let mut report = ConsolidateReport::default();

        report.duplicates_removed = self.dedup_short_term(&cancelled);
        if !cancelled() {
            report.patterns_pruned = self.prune_short_term();
        }
        if !cancelled() {
            report.patterns_promoted = self.promote_eligible();
        }

        self.maybe_rebuild_index();

        info!(
            duplicates_removed = report.duplicates_removed,
            patterns_pruned = report.patterns_pruned,
            patterns_promoted = report.patterns_promoted,
            "Consolidation complete"
        );
        report
    }

    /// O(n²) pairwise dedup over the short-term tier. For each pair at
    /// or above the dedup threshold the higher-quality entry survives
    /// (ties keep the earlier-created) and absorbs the loser's
    /// counters.
    fn dedup_short_term<F: Fn() -> bool>(&mut self, cancelled: &F) -> usize {
        let mut ids: Vec<EntryId> = self.short_term_map().keys().copied().collect();
        // Stable scan order so ties resolve the same way every pass.
        ids.sort();

        let threshold = self.config().dedup_threshold;
        let mut removed = 0;

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                if cancelled() {
                    debug!(removed, "Dedup scan cancelled at checkpoint");
                    return removed;
                }
                let (a, b) = (ids[i], ids[j]);
                let Some((survivor, loser)) = self.dedup_pair(a, b, threshold) else {
                    continue;
                };
                let Some(dead) = self.delete(loser) else {
                    continue;
                };
                if let Some(keep) = self.short_term_map_mut().get_mut(&survivor) {
                    keep.absorb(&dead);
                }
                debug!(%survivor, %loser, "Merged duplicate pair");
                removed += 1;
            }
        }
        removed
    }

    /// Decide the survivor of a candidate pair, or None if the pair is
    /// below the threshold or either side is already gone.
    fn dedup_pair(
        &self,
        a: EntryId,
        b: EntryId,
        threshold: f32,
    ) -> Option<(EntryId, EntryId)> {
        let ea = self.short_term_map().get(&a)?;
        let eb = self.short_term_map().get(&b)?;
        let similarity = pattern_index::cosine_similarity(&ea.vector, &eb.vector).ok()?;
        if similarity < threshold {
            return None;
        }
        let a_wins = match ea
            .quality
            .partial_cmp(&eb.quality)
            .unwrap_or(std::cmp::Ordering::Equal)
        {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => ea.created_at <= eb.created_at,
        };
        if a_wins {
            Some((a, b))
        } else {
            Some((b, a))
        }
    }

    /// Delete short-term entries older than `max_age` with fewer than
    /// two uses.
    fn prune_short_term(&mut self) -> usize {
        let cutoff = Utc::now() - Duration::seconds(self.config().max_age_secs as i64);
        let stale: Vec<EntryId> = self
            .short_term_map()
            .values()
            .filter(|e| e.created_at < cutoff && e.usage_count < 2)
            .map(|e| e.id)
            .collect();

        let mut pruned = 0;
        for id in stale {
            if self.delete(id).is_some() {
                debug!(%id, "Pruned aged entry");
                pruned += 1;
            }
        }
        pruned
    }

    /// Promote every short-term entry that crossed both thresholds.
    fn promote_eligible(&mut self) -> usize {
        let candidates: Vec<EntryId> = {
            let promotion = self.config().promotion_threshold;
            let quality = self.config().quality_threshold;
            self.short_term_map()
                .values()
                .filter(|e| e.usage_count >= promotion && e.quality >= quality)
                .map(|e| e.id)
                .collect()
        };

        let mut promoted = 0;
        for id in candidates {
            if self.maybe_promote(id) {
                promoted += 1;
            }
        }
        promoted
    }

    fn maybe_rebuild_index(&mut self) {
        let index = self.index_mut();
        let live = index.len();
        if live == 0 || (index.tombstones() as f64) / (live as f64) <= REBUILD_TOMBSTONE_RATIO {
            return;
        }
        if let Err(err) = index.rebuild() {
            // Rebuild re-inserts vectors that were already accepted, so
            // this only fires if the graph state is inconsistent.
            debug_assert!(false, "index rebuild failed: {err}");
            tracing::warn!(%err, "Index rebuild failed; tombstones retained");
        }
    }
}
