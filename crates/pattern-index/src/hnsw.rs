//! From-scratch HNSW index over pattern embeddings.
//!
//! Multi-layer navigable small-world graph: each node is assigned a
//! random maximum layer from a geometric distribution, searches descend
//! greedily through the upper layers and finish with a best-first beam
//! at layer 0.
//!
//! Removal is lazy: a removed node is tombstoned and excluded from
//! results and from future neighbor selection, but its edges stay usable
//! as waypoints until `rebuild` compacts the graph. Search never returns
//! a tombstoned id.
//!
//! All structural mutation goes through `&mut self`, so a shared index
//! behind a `RwLock` gives readers a fully-linked graph or nothing.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use pattern_types::EntryId;

use crate::error::IndexError;

/// Hard cap on assigned layers regardless of the geometric draw.
const MAX_LAYER: usize = 32;

/// HNSW index configuration.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Embedding dimension (must match every inserted vector).
    pub dimension: usize,
    /// Connections per node per layer (M parameter).
    pub m: usize,
    /// Connections at layer 0 (conventionally 2*M).
    pub m0: usize,
    /// Beam width while linking a new node.
    pub ef_construction: usize,
    /// Beam width at query time.
    pub ef_search: usize,
    /// Maximum number of live vectors.
    pub capacity: usize,
    /// Level multiplier for layer selection (1/ln(M)).
    pub ml: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(384, 16, 1_000_000)
    }
}

impl IndexConfig {
    pub fn new(dimension: usize, m: usize, capacity: usize) -> Self {
        Self {
            dimension,
            m,
            m0: 2 * m,
            ef_construction: 200,
            ef_search: 100,
            capacity,
            ml: 1.0 / (m as f64).ln(),
        }
    }

    pub fn with_expansion(mut self, ef_construction: usize, ef_search: usize) -> Self {
        self.ef_construction = ef_construction;
        self.ef_search = ef_search;
        self
    }
}

/// A search hit: entry id plus cosine similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: EntryId,
    pub similarity: f32,
}

/// A node in the graph. `links[layer]` holds neighbor slots at that
/// layer; the node participates in layers `0..links.len()`.
#[derive(Debug, Clone)]
struct Node {
    id: EntryId,
    vector: Vec<f32>,
    links: Vec<Vec<usize>>,
    deleted: bool,
}

impl Node {
    fn top_layer(&self) -> usize {
        self.links.len() - 1
    }
}

/// Candidate slot with distance, ordered closest-first (min-heap).
#[derive(Clone, Copy)]
struct Candidate {
    slot: usize,
    distance: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the closest candidate first.
        other
            .distance
            .partial_cmp(&self.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// Max-heap wrapper: pops the farthest result first, used to cap the
/// beam at ef entries.
#[derive(Clone, Copy)]
struct Farthest(Candidate);

impl PartialEq for Farthest {
    fn eq(&self, other: &Self) -> bool {
        self.0.slot == other.0.slot
    }
}

impl Eq for Farthest {}

impl PartialOrd for Farthest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Farthest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .distance
            .partial_cmp(&other.0.distance)
            .unwrap_or(Ordering::Equal)
    }
}

/// HNSW approximate nearest-neighbor index keyed by `EntryId`.
pub struct HnswIndex {
    nodes: Vec<Node>,
    slot_of: HashMap<EntryId, usize>,
    entry_point: Option<usize>,
    max_layer: usize,
    config: IndexConfig,
    rng: StdRng,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("dimension", &self.config.dimension)
            .field("m", &self.config.m)
            .field("live", &self.slot_of.len())
            .field("slots", &self.nodes.len())
            .field("max_layer", &self.max_layer)
            .finish()
    }
}

impl HnswIndex {
    /// Create an index seeded from the OS RNG.
    pub fn new(config: IndexConfig) -> Self {
        Self::build(config, StdRng::from_os_rng())
    }

    /// Create an index with a fixed seed, for reproducible graph shape.
    pub fn with_seed(config: IndexConfig, seed: u64) -> Self {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: IndexConfig, rng: StdRng) -> Self {
        info!(
            dim = config.dimension,
            m = config.m,
            ef_construction = config.ef_construction,
            capacity = config.capacity,
            "Creating HNSW index"
        );
        Self {
            nodes: Vec::new(),
            slot_of: HashMap::new(),
            entry_point: None,
            max_layer: 0,
            config,
            rng,
        }
    }

    /// Number of live (non-tombstoned) vectors.
    pub fn len(&self) -> usize {
        self.slot_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot_of.is_empty()
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.slot_of.contains_key(&id)
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Iterate over live entry ids.
    pub fn ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.slot_of.keys().copied()
    }

    /// Number of tombstoned slots awaiting a `rebuild`.
    pub fn tombstones(&self) -> usize {
        self.nodes.len() - self.slot_of.len()
    }

    /// Draw a maximum layer from the geometric distribution.
    fn random_layer(&mut self) -> usize {
        let u: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        ((-u.ln() * self.config.ml).floor() as usize).min(MAX_LAYER)
    }

    /// Cosine distance (1 - similarity). Dimensions are validated at the
    /// public entry points, and a zero-norm vector sits at maximum
    /// distance.
    fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        1.0 - dot / (norm_a * norm_b)
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m0
        } else {
            self.config.m
        }
    }

    /// Insert a vector under the given id.
    ///
    /// Inserting an id that is already present replaces its vector
    /// (the old node is tombstoned). A failed insert leaves the graph
    /// exactly as it was.
    pub fn insert(&mut self, id: EntryId, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.config.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }

        let replacing = self.slot_of.contains_key(&id);
        let effective_live = self.slot_of.len() - usize::from(replacing);
        if effective_live >= self.config.capacity {
            return Err(IndexError::CapacityExceeded(self.config.capacity));
        }

        if replacing {
            self.remove(id);
        }

        let layer = self.random_layer();

        let Some(mut current) = self.entry_point else {
            // First node becomes the entry point.
            let slot = self.push_node(id, vector, layer);
            self.entry_point = Some(slot);
            self.max_layer = layer;
            debug!(%id, layer, "Inserted first node");
            return Ok(());
        };

        // Greedy descent through layers above the new node's top layer.
        for l in (layer + 1..=self.max_layer).rev() {
            current = self.greedy_closest(vector, current, l);
        }

        // Beam search per shared layer; collect link targets before any
        // mutation so the structural update is all-or-nothing.
        let mut planned: Vec<(usize, Vec<usize>)> = Vec::new();
        for l in (0..=layer.min(self.max_layer)).rev() {
            let beam = self.search_layer(vector, current, self.config.ef_construction, l);
            let selected: Vec<usize> = beam
                .iter()
                .filter(|c| !self.nodes[c.slot].deleted)
                .take(self.max_links(l))
                .map(|c| c.slot)
                .collect();
            if let Some(best) = beam.first() {
                current = best.slot;
            }
            planned.push((l, selected));
        }

        let slot = self.push_node(id, vector, layer);
        for (l, selected) in planned {
            self.nodes[slot].links[l] = selected.clone();
            for neighbor in selected {
                self.nodes[neighbor].links[l].push(slot);
                self.prune_links(neighbor, l);
            }
        }

        if layer > self.max_layer {
            self.max_layer = layer;
            self.entry_point = Some(slot);
        }

        debug!(%id, layer, live = self.slot_of.len(), "Inserted vector");
        Ok(())
    }

    fn push_node(&mut self, id: EntryId, vector: &[f32], layer: usize) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node {
            id,
            vector: vector.to_vec(),
            links: vec![Vec::new(); layer + 1],
            deleted: false,
        });
        self.slot_of.insert(id, slot);
        slot
    }

    /// Keep only the closest `max_links(layer)` neighbors of a node.
    fn prune_links(&mut self, slot: usize, layer: usize) {
        let cap = self.max_links(layer);
        if self.nodes[slot].links[layer].len() <= cap {
            return;
        }
        let anchor = self.nodes[slot].vector.clone();
        let mut ranked: Vec<(usize, f32)> = self.nodes[slot].links[layer]
            .iter()
            .map(|&n| (n, self.distance(&anchor, &self.nodes[n].vector)))
            .collect();
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        self.nodes[slot].links[layer] = ranked.into_iter().take(cap).map(|(n, _)| n).collect();
    }

    /// Greedy walk to the locally closest node at one layer.
    fn greedy_closest(&self, query: &[f32], entry: usize, layer: usize) -> usize {
        let mut current = entry;
        let mut best = self.distance(query, &self.nodes[current].vector);
        loop {
            let mut improved = false;
            for &neighbor in self.layer_links(current, layer) {
                let d = self.distance(query, &self.nodes[neighbor].vector);
                if d < best {
                    current = neighbor;
                    best = d;
                    improved = true;
                }
            }
            if !improved {
                return current;
            }
        }
    }

    fn layer_links(&self, slot: usize, layer: usize) -> &[usize] {
        self.nodes[slot]
            .links
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Best-first beam search at one layer. The returned candidates are
    /// sorted closest-first and may include tombstoned slots; callers
    /// filter those where it matters.
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Candidate> {
        let mut visited: HashSet<usize> = HashSet::new();
        let mut frontier: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut beam: BinaryHeap<Farthest> = BinaryHeap::new();

        let entry_dist = self.distance(query, &self.nodes[entry].vector);
        visited.insert(entry);
        frontier.push(Candidate {
            slot: entry,
            distance: entry_dist,
        });
        beam.push(Farthest(Candidate {
            slot: entry,
            distance: entry_dist,
        }));

        while let Some(current) = frontier.pop() {
            if beam.len() >= ef {
                if let Some(worst) = beam.peek() {
                    if current.distance > worst.0.distance {
                        break;
                    }
                }
            }

            for &neighbor in self.layer_links(current.slot, layer) {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = self.distance(query, &self.nodes[neighbor].vector);
                let admit = beam.len() < ef
                    || beam.peek().map(|worst| d < worst.0.distance).unwrap_or(true);
                if admit {
                    frontier.push(Candidate {
                        slot: neighbor,
                        distance: d,
                    });
                    beam.push(Farthest(Candidate {
                        slot: neighbor,
                        distance: d,
                    }));
                    while beam.len() > ef {
                        beam.pop();
                    }
                }
            }
        }

        let mut results: Vec<Candidate> = beam.into_iter().map(|f| f.0).collect();
        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        results
    }

    /// Search for the k nearest live neighbors using the configured
    /// query beam width.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.search_with_ef(query, k, self.config.ef_search)
    }

    /// Search with an explicit beam width (`ef` is raised to `k` if
    /// smaller). An empty index returns an empty result, not an error.
    pub fn search_with_ef(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
    ) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.config.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 || self.slot_of.is_empty() {
            return Ok(Vec::new());
        }

        let mut current = entry;
        for layer in (1..=self.max_layer).rev() {
            current = self.greedy_closest(query, current, layer);
        }

        let beam = self.search_layer(query, current, ef.max(k), 0);
        let results: Vec<Neighbor> = beam
            .into_iter()
            .filter(|c| !self.nodes[c.slot].deleted)
            .take(k)
            .map(|c| Neighbor {
                id: self.nodes[c.slot].id,
                similarity: 1.0 - c.distance,
            })
            .collect();

        debug!(k, found = results.len(), "Search complete");
        Ok(results)
    }

    /// Tombstone a vector. Returns whether the id was live. The slot
    /// stays in the graph as a waypoint until `rebuild`.
    pub fn remove(&mut self, id: EntryId) -> bool {
        let Some(slot) = self.slot_of.remove(&id) else {
            return false;
        };
        self.nodes[slot].deleted = true;

        // A tombstoned entry point still navigates, but prefer a live
        // one so an eventual rebuild of its neighborhood cannot strand
        // the graph.
        if self.entry_point == Some(slot) {
            self.entry_point = self.highest_live_slot();
            self.max_layer = self
                .entry_point
                .map(|s| self.nodes[s].top_layer())
                .unwrap_or(0);
        }
        debug!(%id, "Tombstoned vector");
        true
    }

    fn highest_live_slot(&self) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.deleted)
            .max_by_key(|(_, n)| n.top_layer())
            .map(|(slot, _)| slot)
    }

    /// Drop all vectors and graph structure, keeping configuration and
    /// RNG state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.slot_of.clear();
        self.entry_point = None;
        self.max_layer = 0;
        info!("Cleared HNSW index");
    }

    /// Physically compact the graph by re-inserting every live vector
    /// into a fresh one. Intended for batch maintenance once tombstones
    /// accumulate.
    pub fn rebuild(&mut self) -> Result<(), IndexError> {
        let live: Vec<(EntryId, Vec<f32>)> = self
            .nodes
            .iter()
            .filter(|n| !n.deleted)
            .map(|n| (n.id, n.vector.clone()))
            .collect();

        info!(
            live = live.len(),
            dropped = self.tombstones(),
            "Rebuilding HNSW index"
        );

        self.nodes.clear();
        self.slot_of.clear();
        self.entry_point = None;
        self.max_layer = 0;

        for (id, vector) in live {
            self.insert(id, &vector)?;
        }
        Ok(())
    }
}
