//! Durable key-value backing store adapter.
//!
//! The in-memory tiers and index are the source of truth during a
//! process lifetime; the backing store only carries entry records
//! across restarts. Persistence is best-effort and retryable: the
//! in-memory state never depends on a write having landed.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use tracing::{debug, info};

use pattern_types::{PatternEntry, StoreSnapshot};

use crate::error::PatternError;
use crate::store::PatternStore;

/// Namespace for persisted short-term entries.
pub const NS_SHORT_TERM: &str = "patterns/short_term";
/// Namespace for persisted long-term entries.
pub const NS_LONG_TERM: &str = "patterns/long_term";

/// Durable key-value persistence contract. Implementations are external
/// collaborators (SQL, embedded KV, object storage); the store only
/// needs these four operations.
pub trait BackingStore: Send + Sync {
    fn put(&self, namespace: &str, id: &str, record: &[u8]) -> Result<(), PatternError>;
    fn get(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, PatternError>;
    fn scan(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>, PatternError>;
    fn delete(&self, namespace: &str, id: &str) -> Result<(), PatternError>;
}

/// In-memory `BackingStore` for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryBackingStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryBackingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackingStore for InMemoryBackingStore {
    fn put(&self, namespace: &str, id: &str, record: &[u8]) -> Result<(), PatternError> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| PatternError::Storage(e.to_string()))?;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(id.to_string(), record.to_vec());
        Ok(())
    }

    fn get(&self, namespace: &str, id: &str) -> Result<Option<Vec<u8>>, PatternError> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| PatternError::Storage(e.to_string()))?;
        Ok(namespaces
            .get(namespace)
            .and_then(|ns| ns.get(id))
            .cloned())
    }

    fn scan(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>, PatternError> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| PatternError::Storage(e.to_string()))?;
        Ok(namespaces
            .get(namespace)
            .map(|ns| {
                ns.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(&self, namespace: &str, id: &str) -> Result<(), PatternError> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| PatternError::Storage(e.to_string()))?;
        if let Some(ns) = namespaces.get_mut(namespace) {
            ns.remove(id);
        }
        Ok(())
    }
}

impl PatternStore {
    /// Write both tiers to the backing store and remove records for ids
    /// no longer live. Safe to retry: records are keyed by entry id.
    pub fn persist_to(&self, backing: &dyn BackingStore) -> Result<(), PatternError> {
        let snapshot = self.export_all();

        for (namespace, entries) in [
            (NS_SHORT_TERM, &snapshot.short_term),
            (NS_LONG_TERM, &snapshot.long_term),
        ] {
            let live: std::collections::HashSet<String> =
                entries.iter().map(|e| e.id.to_string()).collect();
            for (stale_id, _) in backing.scan(namespace)? {
                if !live.contains(&stale_id) {
                    backing.delete(namespace, &stale_id)?;
                }
            }
            for entry in entries {
                let record = serde_json::to_vec(entry)?;
                backing.put(namespace, &entry.id.to_string(), &record)?;
            }
        }

        info!(
            short_term = snapshot.short_term.len(),
            long_term = snapshot.long_term.len(),
            "Persisted store to backing"
        );
        Ok(())
    }

    /// Reload both tiers from the backing store, rebuilding the index
    /// from scratch.
    pub fn load_from(&mut self, backing: &dyn BackingStore) -> Result<(), PatternError> {
        let mut snapshot = StoreSnapshot::default();
        for (id, record) in backing.scan(NS_SHORT_TERM)? {
            let entry: PatternEntry = serde_json::from_slice(&record)?;
            debug!(%id, "Loaded short-term record");
            snapshot.short_term.push(entry);
        }
        for (id, record) in backing.scan(NS_LONG_TERM)? {
            let entry: PatternEntry = serde_json::from_slice(&record)?;
            debug!(%id, "Loaded long-term record");
            snapshot.long_term.push(entry);
        }
        self.import_all(snapshot)
    }
}
