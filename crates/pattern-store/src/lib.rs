//! # pattern-store
//!
//! Tiered embedding pattern store with approximate similarity search,
//! near-duplicate merging, and usage-driven promotion.
//!
//! Entries start in a bounded short-term tier. A near-duplicate insert
//! (cosine similarity at or above the dedup threshold) folds into the
//! existing entry instead of creating a new one. Entries that earn
//! enough usage and quality are promoted to the long-term tier;
//! short-term entries that age out without usage are pruned. The
//! periodic `consolidate` pass performs dedup, pruning, and promotion
//! together, off the hot insert/search path.
//!
//! The store is single-writer, multi-reader: mutations take `&mut self`,
//! searches take `&self`. Callers that share the store across tasks wrap
//! it in a `RwLock`.

pub mod backing;
pub mod consolidate;
pub mod embedding;
pub mod error;
pub mod store;

pub use backing::{BackingStore, InMemoryBackingStore};
pub use consolidate::ConsolidateReport;
pub use embedding::EmbeddingProvider;
pub use error::PatternError;
pub use store::{PatternMatch, PatternStore};
