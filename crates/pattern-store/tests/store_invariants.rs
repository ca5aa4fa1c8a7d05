//! End-to-end store behavior: tier/index consistency under mixed
//! operation sequences, and the headline dedup/promotion/pruning/
//! ranking flows.

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pattern_store::PatternStore;
use pattern_types::{Metadata, StoreAction, StoreConfig, Tier};

fn small_store() -> PatternStore {
    let config = StoreConfig {
        dimension: 2,
        index_m: 4,
        max_short_term: 20,
        max_long_term: 40,
        ..Default::default()
    };
    PatternStore::with_seed(config, 99).unwrap()
}

fn unit(angle: f32) -> Vec<f32> {
    vec![angle.cos(), angle.sin()]
}

#[test]
fn dedup_merge_scenario() {
    let mut store = small_store();

    let first = store
        .insert(unit(0.0), "security", Metadata::new())
        .unwrap();
    assert_eq!(first.action, StoreAction::Created);

    // cos(0.24) ≈ 0.971, above the 0.95 default threshold.
    let second = store
        .insert(unit(0.24), "security", Metadata::new())
        .unwrap();
    assert_eq!(second.action, StoreAction::Updated);
    assert_eq!(second.id, first.id);

    let (entry, tier) = store.entry(first.id).unwrap();
    assert_eq!(entry.usage_count, 2);
    assert_eq!(tier, Tier::ShortTerm);
    assert_eq!(store.len(), 1);
}

#[test]
fn promotion_scenario() {
    let mut store = small_store();
    let receipt = store.insert(unit(0.0), "testing", Metadata::new()).unwrap();

    // Two successful outcomes bring usage to 3 with quality 1.0.
    store.record_outcome(receipt.id, true);
    store.record_outcome(receipt.id, true);
    store.consolidate();

    assert_eq!(store.tier_of(receipt.id), Some(Tier::LongTerm));
    assert_eq!(store.short_term_len(), 0);
    store.check_consistency().unwrap();
}

#[test]
fn pruning_scenario() {
    let mut store = small_store();
    let receipt = store.insert(unit(0.0), "testing", Metadata::new()).unwrap();
    store.set_created_at(receipt.id, Utc::now() - Duration::hours(25));

    let report = store.consolidate();
    assert_eq!(report.patterns_pruned, 1);
    assert_eq!(store.tier_of(receipt.id), None);

    let matches = store.search(&unit(0.0), 10).unwrap();
    assert!(matches.is_empty());
    store.check_consistency().unwrap();
}

#[test]
fn ranking_scenario() {
    let mut store = small_store();
    // Angles chosen for cosine similarities ~0.9, ~0.5, ~0.1 to the
    // query direction.
    let high = store.insert(unit(0.451), "a", Metadata::new()).unwrap();
    let mid = store.insert(unit(1.047), "b", Metadata::new()).unwrap();
    let low = store.insert(unit(1.471), "c", Metadata::new()).unwrap();

    let matches = store.search(&unit(0.0), 2).unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].entry.id, high.id);
    assert_eq!(matches[1].entry.id, mid.id);
    assert!((matches[0].similarity - 0.9).abs() < 0.01);
    assert!((matches[1].similarity - 0.5).abs() < 0.01);
    assert!(matches.iter().all(|m| m.entry.id != low.id));
}

#[test]
fn capacity_bounds_hold_after_every_insert() {
    let mut store = small_store();
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..200 {
        let angle: f32 = rng.random::<f32>() * std::f32::consts::TAU;
        store.insert(unit(angle), "testing", Metadata::new()).unwrap();
        assert!(store.short_term_len() <= store.config().max_short_term);
        assert!(store.long_term_len() <= store.config().max_long_term);
    }
}

#[test]
fn mixed_operations_preserve_tier_index_mirror() {
    let mut store = small_store();
    let mut rng = StdRng::seed_from_u64(17);
    let mut known_ids = Vec::new();

    for step in 0..300 {
        match step % 5 {
            0 | 1 | 2 => {
                let angle: f32 = rng.random::<f32>() * std::f32::consts::TAU;
                let receipt = store
                    .insert(unit(angle), "testing", Metadata::new())
                    .unwrap();
                known_ids.push(receipt.id);
            }
            3 => {
                if let Some(&id) = known_ids.get(rng.random_range(0..known_ids.len().max(1))) {
                    store.record_outcome(id, rng.random::<bool>());
                }
            }
            _ => {
                store.consolidate();
            }
        }
        store.check_consistency().unwrap();
    }

    // Search across tiers still resolves every hit to a live entry.
    let matches = store.search(&unit(1.0), 10).unwrap();
    for m in &matches {
        assert!(store.tier_of(m.entry.id).is_some());
    }
}

#[test]
fn usage_counts_never_decrease() {
    let mut store = small_store();
    let receipt = store.insert(unit(0.0), "testing", Metadata::new()).unwrap();
    let mut last = store.entry(receipt.id).unwrap().0.usage_count;

    for i in 0..20 {
        match i % 3 {
            0 => store.record_outcome(receipt.id, true),
            1 => store.record_outcome(receipt.id, false),
            _ => {
                store.insert(unit(0.01), "testing", Metadata::new()).unwrap();
            }
        }
        if let Ok((entry, _)) = store.entry(receipt.id) {
            assert!(entry.usage_count >= last);
            last = entry.usage_count;
        }
    }
}

#[test]
fn search_similarity_contract_is_stable() {
    let mut store = small_store();
    for i in 0..10 {
        store
            .insert(unit(i as f32 * 0.5), "testing", Metadata::new())
            .unwrap();
    }
    let matches = store.search(&unit(0.7), 10).unwrap();
    assert!(!matches.is_empty());
    for window in matches.windows(2) {
        assert!(window[0].similarity >= window[1].similarity);
    }
    for m in &matches {
        assert!((-1.0..=1.0).contains(&m.similarity));
    }
}
