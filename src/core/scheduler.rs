//! Periodic driver for event sync and check-in passes.
//!
//! Passes never overlap. A stop request is observed between passes, so the pass that is
//! running when `stop()` is called always completes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::core::checkin::CheckInProcessor;
use crate::core::event_sync::EventSyncReconciler;
use crate::utils::clock::Clock;

#[derive(Debug, Clone, Copy)]
pub struct ScheduleTiming {
    /// Time between the starts of two ticks
    pub interval: Duration,
    /// Wait between the sync pass and the check-in pass of one tick
    pub checkin_offset: Duration,
    /// Wait between the first sync pass and the first check-in pass
    pub startup_delay: Duration,
}

pub struct SyncScheduler {
    reconciler: Arc<EventSyncReconciler>,
    checkins: Arc<CheckInProcessor>,
    clock: Arc<dyn Clock>,
    timing: ScheduleTiming,
    stop_tx: watch::Sender<bool>,
}

impl SyncScheduler {
    pub fn new(
        reconciler: Arc<EventSyncReconciler>,
        checkins: Arc<CheckInProcessor>,
        clock: Arc<dyn Clock>,
        timing: ScheduleTiming,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            reconciler,
            checkins,
            clock,
            timing,
            stop_tx,
        }
    }

    /// Ask the loop to halt after the current pass
    pub fn stop(&self) {
        info!("🛑 Scheduler stop requested");
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// One tick: event sync, offset wait, check-ins
    pub async fn run_once(&self, offset: Duration) {
        let sync = self.reconciler.sync_all().await;
        if !sync.failed.is_empty() {
            warn!("⚠️ Event sync: {} operator(s) failed", sync.failed.len());
        }

        self.clock.sleep(offset).await;

        let checkins = self.checkins.process_all().await;
        let minted: usize = checkins.completed.iter().map(|r| r.minted).sum();
        info!(
            "🏁 Pass done: {} event report(s), {} minted, {} failure(s)",
            checkins.completed.len(),
            minted,
            checkins.failed.len()
        );
    }

    /// Run until `stop()` is called. The first pass starts immediately.
    pub async fn run(&self) {
        let mut stop_rx = self.stop_tx.subscribe();
        info!(
            "⏰ Scheduler started (every {}s, check-ins {}s after sync)",
            self.timing.interval.as_secs(),
            self.timing.checkin_offset.as_secs()
        );

        self.run_once(self.timing.startup_delay).await;

        let mut ticker = tokio::time::interval(self.timing.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; the eager pass already ran.
        ticker.tick().await;

        while !*stop_rx.borrow() {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            self.run_once(self.timing.checkin_offset).await;
        }

        info!("👋 Scheduler stopped");
    }
}
