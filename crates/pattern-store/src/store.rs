//! The tiered pattern store.
//!
//! Two bounded maps (short-term and long-term) mirrored by the HNSW
//! index: every live entry id appears in exactly one tier and in the
//! index, and the index never references a deleted entry. Every
//! mutation here updates both sides before returning.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use pattern_index::{cosine_similarity, HnswIndex, IndexConfig};
use pattern_types::{
    EntryId, Metadata, PatternEntry, StoreAction, StoreConfig, StoreReceipt, StoreSnapshot, Tier,
};

use crate::error::PatternError;

/// A search hit: the matched entry, its tier, and the similarity
/// recomputed from the stored vector (stable [-1,1] contract regardless
/// of index internals).
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub entry: PatternEntry,
    pub tier: Tier,
    pub similarity: f32,
}

/// Tiered embedding pattern store.
pub struct PatternStore {
    config: StoreConfig,
    short_term: HashMap<EntryId, PatternEntry>,
    long_term: HashMap<EntryId, PatternEntry>,
    index: HnswIndex,
}

impl PatternStore {
    /// Create a store with an OS-seeded index.
    pub fn new(config: StoreConfig) -> Result<Self, PatternError> {
        config.validate().map_err(PatternError::Config)?;
        let index = HnswIndex::new(Self::index_config(&config));
        Ok(Self::assemble(config, index))
    }

    /// Create a store whose index layer assignment is driven by a fixed
    /// seed, for reproducible tests.
    pub fn with_seed(config: StoreConfig, seed: u64) -> Result<Self, PatternError> {
        config.validate().map_err(PatternError::Config)?;
        let index = HnswIndex::with_seed(Self::index_config(&config), seed);
        Ok(Self::assemble(config, index))
    }

    fn index_config(config: &StoreConfig) -> IndexConfig {
        IndexConfig::new(config.dimension, config.index_m, config.index_capacity())
            .with_expansion(config.ef_construction, config.ef_search)
    }

    fn assemble(config: StoreConfig, index: HnswIndex) -> Self {
        info!(
            dim = config.dimension,
            max_short_term = config.max_short_term,
            max_long_term = config.max_long_term,
            "Created pattern store"
        );
        Self {
            config,
            short_term: HashMap::new(),
            long_term: HashMap::new(),
            index,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Total live entries across both tiers.
    pub fn len(&self) -> usize {
        self.short_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty() && self.long_term.is_empty()
    }

    pub fn short_term_len(&self) -> usize {
        self.short_term.len()
    }

    pub fn long_term_len(&self) -> usize {
        self.long_term.len()
    }

    /// Which tier holds the given id, if any. Long-term wins if an id
    /// were ever present in both (an invariant violation).
    pub fn tier_of(&self, id: EntryId) -> Option<Tier> {
        if self.long_term.contains_key(&id) {
            Some(Tier::LongTerm)
        } else if self.short_term.contains_key(&id) {
            Some(Tier::ShortTerm)
        } else {
            None
        }
    }

    /// Look up an entry by id.
    pub fn entry(&self, id: EntryId) -> Result<(&PatternEntry, Tier), PatternError> {
        if let Some(e) = self.long_term.get(&id) {
            return Ok((e, Tier::LongTerm));
        }
        if let Some(e) = self.short_term.get(&id) {
            return Ok((e, Tier::ShortTerm));
        }
        Err(PatternError::UnknownEntry(id))
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut PatternEntry> {
        if self.long_term.contains_key(&id) {
            return self.long_term.get_mut(&id);
        }
        self.short_term.get_mut(&id)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), PatternError> {
        if vector.len() != self.config.dimension {
            return Err(pattern_index::IndexError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Insert a vector, merging into a near-duplicate if one exists.
    ///
    /// If the nearest existing entry is at or above the dedup threshold
    /// the insert becomes an update of that entry (usage incremented,
    /// quality recomputed). Otherwise a new entry is created in the
    /// short-term tier, evicting the least-used entry first when the
    /// tier is full.
    pub fn insert(
        &mut self,
        vector: Vec<f32>,
        domain: &str,
        metadata: Metadata,
    ) -> Result<StoreReceipt, PatternError> {
        self.check_dimension(&vector)?;

        if let Some(nearest) = self.index.search(&vector, 1)?.first().copied() {
            if nearest.similarity >= self.config.dedup_threshold {
                if let Some(existing) = self.entry_mut(nearest.id) {
                    existing.record_usage();
                    debug!(id = %nearest.id, similarity = nearest.similarity, "Merged near-duplicate");
                    return Ok(StoreReceipt {
                        id: nearest.id,
                        action: StoreAction::Updated,
                    });
                }
                // Index returned an id absent from both tiers.
                debug_assert!(false, "index id {} missing from tiers", nearest.id);
                warn!(id = %nearest.id, "Index returned id missing from both tiers; skipping");
            }
        }

        if self.short_term.len() >= self.config.max_short_term {
            self.evict_short_term()?;
        }

        let entry = PatternEntry::new(vector, domain, metadata);
        let id = entry.id;
        self.index.insert(id, &entry.vector)?;
        self.short_term.insert(id, entry);
        debug!(%id, domain, short_term = self.short_term.len(), "Created pattern");

        Ok(StoreReceipt {
            id,
            action: StoreAction::Created,
        })
    }

    /// Evict the short-term entry with the lowest usage count (oldest
    /// created wins the tie), from both the map and the index.
    fn evict_short_term(&mut self) -> Result<(), PatternError> {
        let victim = self
            .short_term
            .values()
            .min_by_key(|e| (e.usage_count, e.created_at))
            .map(|e| e.id)
            .ok_or(PatternError::CapacityExceeded {
                tier: Tier::ShortTerm,
                max: self.config.max_short_term,
            })?;
        self.short_term.remove(&victim);
        self.index.remove(victim);
        debug!(id = %victim, "Evicted short-term entry at capacity");
        Ok(())
    }

    /// Evict the lowest-value long-term entry to make room for a
    /// promotion.
    fn evict_long_term(&mut self) -> Result<(), PatternError> {
        let victim = self
            .long_term
            .values()
            .min_by_key(|e| (e.usage_count, e.created_at))
            .map(|e| e.id)
            .ok_or(PatternError::CapacityExceeded {
                tier: Tier::LongTerm,
                max: self.config.max_long_term,
            })?;
        self.long_term.remove(&victim);
        self.index.remove(victim);
        debug!(id = %victim, "Evicted long-term entry at capacity");
        Ok(())
    }

    /// Record the outcome of using a pattern. Unknown ids are a no-op:
    /// outcome reports racing with pruning are expected and harmless.
    pub fn record_outcome(&mut self, id: EntryId, success: bool) {
        let Some(entry) = self.entry_mut(id) else {
            debug!(%id, "Outcome for unknown entry ignored");
            return;
        };
        entry.record_outcome(success);
        self.maybe_promote(id);
    }

    /// Move a short-term entry to long-term if it crossed both the
    /// usage and quality thresholds. The index is untouched: same id,
    /// same vector, same graph position.
    pub(crate) fn maybe_promote(&mut self, id: EntryId) -> bool {
        let eligible = match self.short_term.get(&id) {
            Some(e) => {
                e.usage_count >= self.config.promotion_threshold
                    && e.quality >= self.config.quality_threshold
            }
            None => false,
        };
        if !eligible {
            return false;
        }
        if self.long_term.len() >= self.config.max_long_term {
            if let Err(err) = self.evict_long_term() {
                warn!(%id, %err, "Promotion blocked: long-term eviction failed");
                return false;
            }
        }
        if let Some(entry) = self.short_term.remove(&id) {
            debug!(%id, usage = entry.usage_count, quality = entry.quality, "Promoted to long-term");
            self.long_term.insert(id, entry);
            return true;
        }
        false
    }

    /// k-nearest search over both tiers, ranked by similarity
    /// recomputed from the stored vectors.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<PatternMatch>, PatternError> {
        self.check_dimension(query)?;

        let hits = self.index.search(query, k)?;
        let mut matches = Vec::with_capacity(hits.len());
        for hit in hits {
            let Ok((entry, tier)) = self.entry(hit.id) else {
                debug_assert!(false, "index id {} missing from tiers", hit.id);
                warn!(id = %hit.id, "Search hit missing from both tiers; skipping");
                continue;
            };
            let similarity = cosine_similarity(query, &entry.vector)?;
            matches.push(PatternMatch {
                entry: entry.clone(),
                tier,
                similarity,
            });
        }
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(k, found = matches.len(), "Pattern search complete");
        Ok(matches)
    }

    /// Remove an entry from its tier and the index.
    pub(crate) fn delete(&mut self, id: EntryId) -> Option<PatternEntry> {
        let entry = self
            .short_term
            .remove(&id)
            .or_else(|| self.long_term.remove(&id))?;
        self.index.remove(id);
        Some(entry)
    }

    pub(crate) fn index_mut(&mut self) -> &mut HnswIndex {
        &mut self.index
    }

    pub(crate) fn short_term_map(&self) -> &HashMap<EntryId, PatternEntry> {
        &self.short_term
    }

    pub(crate) fn short_term_map_mut(&mut self) -> &mut HashMap<EntryId, PatternEntry> {
        &mut self.short_term
    }

    /// Dump both tiers for backup. The index graph is never exported:
    /// layer assignment is randomized and a restore rebuilds it.
    pub fn export_all(&self) -> StoreSnapshot {
        let mut short_term: Vec<PatternEntry> = self.short_term.values().cloned().collect();
        let mut long_term: Vec<PatternEntry> = self.long_term.values().cloned().collect();
        short_term.sort_by_key(|e| e.created_at);
        long_term.sort_by_key(|e| e.created_at);
        StoreSnapshot {
            short_term,
            long_term,
        }
    }

    /// Replace the store contents with a snapshot, rebuilding the index
    /// from scratch. Validates the whole snapshot before touching any
    /// state.
    pub fn import_all(&mut self, snapshot: StoreSnapshot) -> Result<(), PatternError> {
        if snapshot.short_term.len() > self.config.max_short_term {
            return Err(PatternError::CapacityExceeded {
                tier: Tier::ShortTerm,
                max: self.config.max_short_term,
            });
        }
        if snapshot.long_term.len() > self.config.max_long_term {
            return Err(PatternError::CapacityExceeded {
                tier: Tier::LongTerm,
                max: self.config.max_long_term,
            });
        }
        for entry in snapshot.short_term.iter().chain(snapshot.long_term.iter()) {
            self.check_dimension(&entry.vector)?;
        }

        self.short_term.clear();
        self.long_term.clear();
        self.index.clear();

        for entry in snapshot.long_term {
            self.index.insert(entry.id, &entry.vector)?;
            self.long_term.insert(entry.id, entry);
        }
        for entry in snapshot.short_term {
            // An id already restored into long-term wins.
            if self.long_term.contains_key(&entry.id) {
                warn!(id = %entry.id, "Snapshot id present in both tiers; keeping long-term");
                continue;
            }
            self.index.insert(entry.id, &entry.vector)?;
            self.short_term.insert(entry.id, entry);
        }

        info!(
            short_term = self.short_term.len(),
            long_term = self.long_term.len(),
            "Imported snapshot, index rebuilt"
        );
        Ok(())
    }

    /// Verify the tier/index mirror invariant: every tier id is in the
    /// index, every index id is in exactly one tier.
    pub fn check_consistency(&self) -> Result<(), PatternError> {
        for id in self.short_term.keys() {
            if self.long_term.contains_key(id) {
                return Err(PatternError::Corruption(format!(
                    "entry {id} present in both tiers"
                )));
            }
        }
        for id in self.short_term.keys().chain(self.long_term.keys()) {
            if !self.index.contains(*id) {
                return Err(PatternError::Corruption(format!(
                    "entry {id} missing from index"
                )));
            }
        }
        for id in self.index.ids() {
            if !self.short_term.contains_key(&id) && !self.long_term.contains_key(&id) {
                return Err(PatternError::Corruption(format!(
                    "index id {id} missing from both tiers"
                )));
            }
        }
        Ok(())
    }

    /// Backdate an entry's creation time. Test hook for age-based
    /// pruning scenarios.
    #[doc(hidden)]
    pub fn set_created_at(&mut self, id: EntryId, created_at: DateTime<Utc>) {
        if let Some(entry) = self.entry_mut(id) {
            entry.created_at = created_at;
        }
    }
}
