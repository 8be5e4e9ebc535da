//! Sync engine: orchestrates one reconciliation cycle at a time.
//!
//! Each cycle:
//!
//! 1. Fetch the remote batch (a transport failure skips the whole cycle).
//! 2. Reconcile it against the session-owned local set (server wins).
//! 3. Persist the merged set when it changed.
//! 4. Record conflicts and a sync-log row, and send notifications.
//!
//! A lock mechanism prevents concurrent cycles: the periodic trigger must
//! skip, never queue, while one is outstanding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::errors::{ConflictError, StoreError, SyncError};
use crate::models::{CycleStats, QuoteRecord, SyncStatus};
use crate::notify::Notifier;
use crate::reconcile;
use crate::remote::RemoteClient;
use crate::store::Store;

/// The reconciliation engine.
///
/// Holds the in-memory record set between cycles. The set is reloaded from
/// the store at the start of every cycle and persisted whole at the end, so
/// records written by another process against the same store (the CLI, while
/// the daemon runs) survive a cycle. The overlap lock is per process; a
/// cycle in another process is serialized only by that reload plus the
/// single save transaction.
pub struct SyncEngine {
    config: AppConfig,
    store: Store,
    remote: RemoteClient,
    notifier: Notifier,
    quotes: tokio::sync::Mutex<Vec<QuoteRecord>>,
    /// Atomic flag preventing concurrent sync cycles.
    running: Arc<AtomicBool>,
    /// Start time of the cycle currently holding the lock.
    cycle_started_at: std::sync::Mutex<Option<DateTime<Utc>>>,
}

impl SyncEngine {
    /// Create an engine, loading the current record set from the store.
    pub fn new(config: AppConfig, store: Store, remote: RemoteClient) -> Result<Self, StoreError> {
        let quotes = store.load_quotes()?;
        let notifier = Notifier::new(&config.notifications);
        info!(count = quotes.len(), "initialized sync engine");
        Ok(Self {
            config,
            store,
            remote,
            notifier,
            quotes: tokio::sync::Mutex::new(quotes),
            running: Arc::new(AtomicBool::new(false)),
            cycle_started_at: std::sync::Mutex::new(None),
        })
    }

    /// Return a reference to the store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if a sync cycle is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the in-memory record set.
    pub async fn quotes(&self) -> Vec<QuoteRecord> {
        self.quotes.lock().await.clone()
    }

    // -----------------------------------------------------------------------
    // Main entry point
    // -----------------------------------------------------------------------

    /// Execute one full sync cycle.
    ///
    /// Returns statistics about what was reconciled. Conflicts are resolved
    /// in favour of the remote inline and reported in the stats; they do not
    /// fail the cycle. The sync lock is released via a drop guard so it is
    /// freed even if the cycle panics.
    pub async fn run_sync_cycle(&self) -> Result<CycleStats, SyncError> {
        // Acquire the sync lock.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let started_at = self
                .cycle_started_at
                .lock()
                .map(|t| *t)
                .unwrap_or_default()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".into());
            return Err(SyncError::AlreadyRunning { started_at });
        }

        // RAII guard that clears the running flag on drop (even on panic).
        let _guard = SyncLockGuard(self.running.clone());

        let started_at = Utc::now();
        if let Ok(mut slot) = self.cycle_started_at.lock() {
            *slot = Some(started_at);
        }

        let mut stats = CycleStats {
            started_at: Some(started_at),
            ..Default::default()
        };

        // 1. Fetch. A failed or timed-out fetch skips the whole cycle:
        //    nothing is mutated and the next tick retries.
        let batch = match self.remote.fetch().await {
            Ok(batch) => batch,
            Err(e) => {
                self.notifier.notify_cycle_failed(&e.to_string()).await;
                if let Err(log_err) = self
                    .store
                    .insert_sync_log(&stats, false, Some(&e.to_string()))
                {
                    warn!(error = %log_err, "failed to record sync-log row");
                }
                return Err(SyncError::Fetch(e));
            }
        };
        stats.remote_items = batch.len();

        // 2. Reload the set from the store, then reconcile, all under the
        //    set lock. The reload picks up records written by another
        //    process since the last cycle; the lock is held through the save
        //    so no in-process mutation can interleave with persisting the
        //    result.
        let mut quotes = self.quotes.lock().await;
        *quotes = match self.store.load_quotes() {
            Ok(set) => set,
            Err(e) => {
                drop(quotes);
                self.notifier.notify_cycle_failed(&e.to_string()).await;
                if let Err(log_err) = self
                    .store
                    .insert_sync_log(&stats, false, Some(&e.to_string()))
                {
                    warn!(error = %log_err, "failed to record sync-log row");
                }
                return Err(SyncError::Store(e));
            }
        };
        let outcome = reconcile::reconcile(&mut quotes, &batch);
        stats.conflicts = outcome.conflicts.len();
        stats.admitted = outcome.admitted;
        stats.attached = outcome.attached;
        stats.skipped_malformed = outcome.skipped;
        stats.changed = outcome.changed;

        // 3. Persist. The save is a single transaction; on failure the
        //    stored set is untouched and the next cycle re-derives the same
        //    merged result from the reload (reconcile is idempotent).
        if outcome.changed {
            if let Err(e) = self.store.save_quotes(&quotes) {
                drop(quotes);
                self.notifier.notify_cycle_failed(&e.to_string()).await;
                if let Err(log_err) = self
                    .store
                    .insert_sync_log(&stats, false, Some(&e.to_string()))
                {
                    warn!(error = %log_err, "failed to record sync-log row");
                }
                return Err(SyncError::Store(e));
            }
        }
        drop(quotes);

        // 4. Record conflicts and notify.
        for conflict in &outcome.conflicts {
            if let Err(e) = self.store.insert_conflict(conflict) {
                warn!(conflict_id = %conflict.id, error = %e, "failed to persist conflict");
            }
        }
        self.notifier.notify_conflicts(&outcome.conflicts).await;

        stats.completed_at = Some(Utc::now());
        let details = format!(
            "remote: {}, conflicts: {}, admitted: {}, attached: {}, skipped: {}",
            stats.remote_items, stats.conflicts, stats.admitted, stats.attached,
            stats.skipped_malformed
        );
        if let Err(e) = self.store.insert_sync_log(&stats, true, Some(&details)) {
            warn!(error = %e, "failed to record sync-log row");
        }
        if let Err(e) = self.store.set_state("last_sync_at", &Utc::now().to_rfc3339()) {
            warn!(error = %e, "failed to update last_sync_at");
        }

        self.notifier.notify_cycle_completed(&stats).await;

        info!(
            remote_items = stats.remote_items,
            conflicts = stats.conflicts,
            admitted = stats.admitted,
            attached = stats.attached,
            changed = stats.changed,
            "sync cycle completed"
        );
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Manual override
    // -----------------------------------------------------------------------

    /// Re-send the local pre-image of a resolved conflict to the remote.
    ///
    /// This is an explicit user action layered on top of reconciliation. It
    /// does not reverse the in-memory merge; it only affects what is re-sent
    /// outward. The conflict is marked `overridden` once the push succeeds.
    pub async fn override_conflict(&self, conflict_id: &str) -> Result<(), ConflictError> {
        let row = self
            .store
            .get_conflict(conflict_id)?
            .ok_or_else(|| ConflictError::NotFound(conflict_id.to_string()))?;

        if row.status == crate::models::ConflictStatus::Overridden {
            return Err(ConflictError::AlreadyOverridden(conflict_id.to_string()));
        }

        let pre_image = QuoteRecord {
            id: row.quote_id,
            remote_id: Some(row.remote_id),
            text: row.local_text,
            category: row.local_category,
            last_modified: Utc::now(),
        };

        self.remote
            .push(&pre_image)
            .await
            .map_err(|e| ConflictError::PushFailed {
                id: conflict_id.to_string(),
                source: e,
            })?;

        self.store.mark_conflict_overridden(conflict_id)?;
        info!(conflict_id, "conflict overridden: local version re-sent outward");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Summarize engine and store state.
    pub async fn status(&self) -> Result<SyncStatus, StoreError> {
        let quote_count = self.quotes.lock().await.len();

        let last_sync_at = self.store.get_state("last_sync_at")?.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        });

        Ok(SyncStatus {
            quote_count,
            last_sync_at,
            total_cycles: self.store.count_sync_cycles()?,
            total_conflicts: self.store.count_all_conflicts()?,
            active_conflicts: self.store.count_active_conflicts()?,
            total_errors: self.store.count_sync_errors()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Sync lock RAII guard
// ---------------------------------------------------------------------------

/// Drop guard that resets the `running` flag to `false`.
///
/// Ensures the sync lock is always released, even if a cycle panics.
struct SyncLockGuard(Arc<AtomicBool>);

impl Drop for SyncLockGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn engine_with_unreachable_remote() -> SyncEngine {
        let store = Store::in_memory().unwrap();
        store.initialize().unwrap();
        let config: AppConfig = toml::from_str(
            r#"
[remote]
base_url = "http://127.0.0.1:1/quotes"
timeout_secs = 1
"#,
        )
        .unwrap();
        let remote = RemoteClient::new(
            config.remote.base_url.clone(),
            Duration::from_secs(config.remote.timeout_secs),
            None,
        )
        .unwrap();
        SyncEngine::new(config, store, remote).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_cycle_and_mutates_nothing() {
        let engine = engine_with_unreachable_remote();
        engine
            .store()
            .insert_quote(&QuoteRecord::new("Untouched", "x"))
            .unwrap();

        let result = engine.run_sync_cycle().await;
        assert!(matches!(result, Err(SyncError::Fetch(_))));

        // The stored set is untouched and the failure is on record.
        assert_eq!(engine.store().count_quotes().unwrap(), 1);
        assert_eq!(engine.store().count_sync_errors().unwrap(), 1);
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_override_unknown_conflict() {
        let engine = engine_with_unreachable_remote();
        let result = engine.override_conflict("no-such-id").await;
        assert!(matches!(result, Err(ConflictError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_status_on_fresh_store() {
        let engine = engine_with_unreachable_remote();
        let status = engine.status().await.unwrap();
        assert_eq!(status.quote_count, 0);
        assert_eq!(status.total_cycles, 0);
        assert_eq!(status.active_conflicts, 0);
        assert!(status.last_sync_at.is_none());
    }
}
