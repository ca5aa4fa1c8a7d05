//! Embedding provider seam.
//!
//! Embedding generation is an external collaborator: the store treats
//! `embed` as an opaque text-to-vector function and never branches on
//! which backend produced it. The provider is expected to be
//! deterministic enough that repeated calls on identical text land
//! within the dedup threshold of each other.

use pattern_types::{Metadata, StoreReceipt};

use crate::error::PatternError;
use crate::store::PatternStore;

/// Opaque text-to-vector function injected by the caller.
pub trait EmbeddingProvider: Send + Sync {
    /// Produce an embedding of the configured dimension.
    fn embed(&self, text: &str) -> Result<Vec<f32>, PatternError>;
}

impl PatternStore {
    /// Embed `text` through the provider and insert the result.
    pub fn insert_text(
        &mut self,
        provider: &dyn EmbeddingProvider,
        text: &str,
        domain: &str,
        metadata: Metadata,
    ) -> Result<StoreReceipt, PatternError> {
        let vector = provider.embed(text)?;
        self.insert(vector, domain, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pattern_types::{StoreAction, StoreConfig};

    /// Deterministic toy embedder: hashes bytes into a fixed-dimension
    /// bag-of-characters direction.
    struct HashEmbedder {
        dimension: usize,
    }

    impl EmbeddingProvider for HashEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, PatternError> {
            let mut v = vec![0.0f32; self.dimension];
            for (i, b) in text.bytes().enumerate() {
                v[(i + b as usize) % self.dimension] += 1.0;
            }
            Ok(v)
        }
    }

    fn test_store(dimension: usize) -> PatternStore {
        let config = StoreConfig {
            dimension,
            index_m: 4,
            max_short_term: 10,
            max_long_term: 20,
            ..Default::default()
        };
        PatternStore::with_seed(config, 7).unwrap()
    }

    #[test]
    fn test_insert_text_roundtrip() {
        let provider = HashEmbedder { dimension: 8 };
        let mut s = test_store(8);

        let first = s
            .insert_text(&provider, "use prepared statements", "security", Metadata::new())
            .unwrap();
        assert_eq!(first.action, StoreAction::Created);

        // Identical text embeds identically and merges.
        let again = s
            .insert_text(&provider, "use prepared statements", "security", Metadata::new())
            .unwrap();
        assert_eq!(again.action, StoreAction::Updated);
        assert_eq!(again.id, first.id);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_provider_dimension_mismatch_surfaces() {
        let provider = HashEmbedder { dimension: 4 };
        let mut s = test_store(8);
        let result = s.insert_text(&provider, "wrong width", "testing", Metadata::new());
        assert!(matches!(result, Err(PatternError::Index(_))));
        assert!(s.is_empty());
    }
}
