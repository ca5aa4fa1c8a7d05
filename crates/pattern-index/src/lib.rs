//! # pattern-index
//!
//! Approximate nearest-neighbor search for the pattern-bank store.
//!
//! This crate provides semantic similarity search over fixed-dimension
//! f32 embeddings via a from-scratch HNSW (Hierarchical Navigable Small
//! World) graph:
//! - O(log n) approximate k-NN search with configurable beam widths
//! - Seeded, injectable RNG for reproducible graph shape in tests
//! - Tombstone removal with batch `rebuild` compaction
//! - Configurable HNSW parameters (M, ef_construction, ef_search)

pub mod error;
pub mod hnsw;
pub mod math;

pub use error::IndexError;
pub use hnsw::{HnswIndex, IndexConfig, Neighbor};
pub use math::{cosine_similarity, dot_product, euclidean_distance};
