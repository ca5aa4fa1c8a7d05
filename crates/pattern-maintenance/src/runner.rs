//! The consolidation loop.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pattern_store::{ConsolidateReport, PatternStore};

use crate::config::MaintenanceConfig;

/// Run one consolidation pass on a blocking thread, holding the write
/// lock only for the duration of the pass. Returns `None` if the pass
/// could not run (poisoned lock or runtime shutdown).
pub async fn consolidate_once(
    store: Arc<RwLock<PatternStore>>,
    cancel: CancellationToken,
) -> Option<ConsolidateReport> {
    let handle = tokio::task::spawn_blocking(move || {
        let mut guard = match store.write() {
            Ok(guard) => guard,
            Err(err) => {
                warn!(%err, "Store lock poisoned; skipping consolidation");
                return None;
            }
        };
        Some(guard.consolidate_with(|| cancel.is_cancelled()))
    });

    match handle.await {
        Ok(report) => report,
        Err(err) => {
            warn!(%err, "Consolidation task failed");
            None
        }
    }
}

/// Periodic consolidation until the token is cancelled.
///
/// The first pass runs immediately; missed ticks are skipped rather
/// than bursted. A cancellation arriving mid-pass stops the pass at its
/// next checkpoint.
pub async fn run_maintenance(
    store: Arc<RwLock<PatternStore>>,
    config: MaintenanceConfig,
    cancel: CancellationToken,
) {
    if !config.enabled {
        info!("Maintenance loop disabled");
        return;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = config.interval_secs, "Maintenance loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Maintenance loop shutting down");
                return;
            }
            _ = interval.tick() => {
                match consolidate_once(store.clone(), cancel.clone()).await {
                    Some(report) if !report.is_empty() => {
                        info!(
                            duplicates_removed = report.duplicates_removed,
                            patterns_pruned = report.patterns_pruned,
                            patterns_promoted = report.patterns_promoted,
                            "Background consolidation"
                        );
                    }
                    Some(_) => debug!("Background consolidation: nothing to do"),
                    None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pattern_types::{Metadata, StoreConfig};

    fn shared_store() -> Arc<RwLock<PatternStore>> {
        let config = StoreConfig {
            dimension: 2,
            index_m: 4,
            max_short_term: 10,
            max_long_term: 20,
            ..Default::default()
        };
        Arc::new(RwLock::new(PatternStore::with_seed(config, 7).unwrap()))
    }

    #[tokio::test]
    async fn test_consolidate_once_prunes_aged_entries() {
        let store = shared_store();
        {
            let mut s = store.write().unwrap();
            let r = s.insert(vec![1.0, 0.0], "testing", Metadata::new()).unwrap();
            s.set_created_at(r.id, chrono::Utc::now() - chrono::Duration::hours(25));
        }

        let report = consolidate_once(store.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.patterns_pruned, 1);
        assert!(store.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_yields_empty_pass() {
        let store = shared_store();
        {
            let mut s = store.write().unwrap();
            s.insert(vec![1.0, 0.0], "testing", Metadata::new()).unwrap();
            s.insert(vec![0.0, 1.0], "testing", Metadata::new()).unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = consolidate_once(store, cancel).await.unwrap();
        assert_eq!(report, ConsolidateReport::default());
    }

    #[tokio::test]
    async fn test_disabled_loop_returns_immediately() {
        let store = shared_store();
        let config = MaintenanceConfig {
            enabled: false,
            ..Default::default()
        };
        // Must complete without the token ever being cancelled.
        run_maintenance(store, config, CancellationToken::new()).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_first_pass_then_stops_on_cancel() {
        let store = shared_store();
        {
            let mut s = store.write().unwrap();
            let r = s.insert(vec![1.0, 0.0], "testing", Metadata::new()).unwrap();
            s.set_created_at(r.id, chrono::Utc::now() - chrono::Duration::hours(25));
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_maintenance(
            store.clone(),
            MaintenanceConfig::default(),
            cancel.clone(),
        ));

        // First tick fires immediately; wait for the pass to land.
        tokio::time::timeout(Duration::from_secs(60), async {
            while !store.read().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap();
    }
}
