//! Periodic sync scheduler.
//!
//! Runs one sync cycle immediately at startup and then on the configured
//! interval. Cycles are awaited sequentially and the engine holds its own
//! overlap lock, so a slow cycle delays the next tick instead of running
//! concurrently with it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use quotesync_core::engine::SyncEngine;
use quotesync_core::errors::SyncError;

/// Aggregate statistics across sync cycles.
pub struct SchedulerStats {
    pub total_cycles: AtomicU64,
    pub total_conflicts: AtomicU64,
    pub total_errors: AtomicU64,
    pub consecutive_errors: AtomicU64,
}

impl SchedulerStats {
    fn new() -> Self {
        Self {
            total_cycles: AtomicU64::new(0),
            total_conflicts: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            consecutive_errors: AtomicU64::new(0),
        }
    }
}

/// The sync scheduler.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    sync_interval: Duration,
    stats: Arc<SchedulerStats>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, sync_interval: Duration) -> Self {
        Self {
            engine,
            sync_interval,
            stats: Arc::new(SchedulerStats::new()),
        }
    }

    /// Main scheduler loop.
    ///
    /// The first tick fires immediately, giving the startup sync; the loop
    /// then runs until `shutdown` is notified, finishing any in-flight cycle
    /// before returning.
    pub async fn run(&mut self, shutdown: Arc<Notify>) {
        info!(
            sync_interval_secs = self.sync_interval.as_secs(),
            "scheduler started"
        );

        let mut interval = time::interval(self.sync_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.notified() => {
                    info!("scheduler shutting down");
                    return;
                }
            }
        }
    }

    async fn run_cycle(&self) {
        let cycle_num = self.stats.total_cycles.fetch_add(1, Ordering::SeqCst) + 1;
        info!(cycle = cycle_num, "starting sync cycle");

        match self.engine.run_sync_cycle().await {
            Ok(stats) => {
                self.stats.consecutive_errors.store(0, Ordering::SeqCst);
                self.stats
                    .total_conflicts
                    .fetch_add(stats.conflicts as u64, Ordering::SeqCst);

                info!(
                    cycle = cycle_num,
                    remote_items = stats.remote_items,
                    conflicts = stats.conflicts,
                    admitted = stats.admitted,
                    attached = stats.attached,
                    skipped = stats.skipped_malformed,
                    changed = stats.changed,
                    "sync cycle completed"
                );
            }
            Err(SyncError::AlreadyRunning { started_at }) => {
                // Can only happen if something else drives the same engine.
                warn!(
                    cycle = cycle_num,
                    started_at, "skipping cycle: previous cycle still running"
                );
            }
            Err(e) => {
                let errors = self.stats.total_errors.fetch_add(1, Ordering::SeqCst) + 1;
                let consecutive = self
                    .stats
                    .consecutive_errors
                    .fetch_add(1, Ordering::SeqCst)
                    + 1;
                error!(
                    cycle = cycle_num,
                    error = %e,
                    total_errors = errors,
                    consecutive_errors = consecutive,
                    "sync cycle failed, retrying at next tick"
                );
            }
        }
    }
}
