//! # pattern-maintenance
//!
//! Background consolidation for a shared `PatternStore`.
//!
//! Consolidation (dedup, prune, promote) is the one store operation
//! whose cost scales with tier size, so it runs here on a timer instead
//! of inline with inserts. The loop takes the store's write lock only
//! for the duration of one pass and honors a `CancellationToken` both
//! between ticks and between pairwise comparisons inside a pass.

pub mod config;
pub mod runner;

pub use config::MaintenanceConfig;
pub use runner::{consolidate_once, run_maintenance};
