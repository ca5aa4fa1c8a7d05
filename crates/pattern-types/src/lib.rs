//! # pattern-types
//!
//! Shared domain types for the pattern-bank tiered embedding store.
//!
//! This crate defines the core data structures used throughout the system:
//! - `PatternEntry`: a stored embedding with usage/quality statistics
//! - `Tier`: the short-term / long-term partition an entry lives in
//! - `StoreConfig`: constructor-time configuration with validation
//! - `StoreSnapshot`: export/import format for backup and restore

pub mod config;
pub mod entry;
pub mod snapshot;

pub use config::StoreConfig;
pub use entry::{EntryId, Metadata, PatternEntry, StoreAction, StoreReceipt, Tier};
pub use snapshot::StoreSnapshot;
