//! Telemetry Module
//!
//! Counters for reconciliation passes and mint outcomes, emitted alongside logs
//! when minting is driven by the background reconciler.
//!
//! Privacy-first: counts only, no wallet addresses or API keys.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::types::{CheckInReport, SyncReport};

/// Snapshot of all counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    pub sync_passes: u64,
    pub checkin_passes: u64,
    pub events_created: u64,
    pub events_updated: u64,
    pub events_deleted: u64,
    pub guests_seen: u64,
    pub guests_checked_in: u64,
    pub guests_missing_wallet: u64,
    pub mints_attempted: u64,
    pub mints_succeeded: u64,
    pub mints_failed: u64,
    /// Operator or event passes aborted by a provider/storage error
    pub pass_failures: u64,
    pub period_start: u64,
    pub period_end: u64,
}

impl TelemetryStats {
    /// Human-readable summary printed on shutdown
    pub fn summary(&self) -> String {
        let period_minutes = self.period_end.saturating_sub(self.period_start) / 60;
        format!(
            r#"
╔══════════════════════════════════════════════════╗
║        🎟️  ATTENDANCE MINTER - SESSION REPORT      ║
╠══════════════════════════════════════════════════╣
║   ⏱️  Uptime:              {:>10} min           ║
║   🔄 Sync passes:          {:>10}               ║
║   📋 Check-in passes:      {:>10}               ║
║   ➕ Events created:       {:>10}               ║
║   ✏️  Events updated:       {:>10}               ║
║   🗑️  Events deleted:       {:>10}               ║
║   👥 Guests checked in:    {:>10}               ║
║   🎟️  Mints succeeded:      {:>10}               ║
║   ❌ Mints failed:         {:>10}               ║
║   ⚠️  Pass failures:        {:>10}               ║
╚══════════════════════════════════════════════════╝
"#,
            period_minutes,
            self.sync_passes,
            self.checkin_passes,
            self.events_created,
            self.events_updated,
            self.events_deleted,
            self.guests_checked_in,
            self.mints_succeeded,
            self.mints_failed,
            self.pass_failures,
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Lock-free counter set
pub struct TelemetryCollector {
    sync_passes: AtomicU64,
    checkin_passes: AtomicU64,
    events_created: AtomicU64,
    events_updated: AtomicU64,
    events_deleted: AtomicU64,
    guests_seen: AtomicU64,
    guests_checked_in: AtomicU64,
    guests_missing_wallet: AtomicU64,
    mints_attempted: AtomicU64,
    mints_succeeded: AtomicU64,
    mints_failed: AtomicU64,
    pass_failures: AtomicU64,
    session_start: u64,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            sync_passes: AtomicU64::new(0),
            checkin_passes: AtomicU64::new(0),
            events_created: AtomicU64::new(0),
            events_updated: AtomicU64::new(0),
            events_deleted: AtomicU64::new(0),
            guests_seen: AtomicU64::new(0),
            guests_checked_in: AtomicU64::new(0),
            guests_missing_wallet: AtomicU64::new(0),
            mints_attempted: AtomicU64::new(0),
            mints_succeeded: AtomicU64::new(0),
            mints_failed: AtomicU64::new(0),
            pass_failures: AtomicU64::new(0),
            session_start: current_timestamp(),
        }
    }

    pub fn record_sync_pass(&self) {
        self.sync_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checkin_pass(&self) {
        self.checkin_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sync(&self, report: &SyncReport) {
        self.events_created.fetch_add(report.created as u64, Ordering::Relaxed);
        self.events_updated.fetch_add(report.updated as u64, Ordering::Relaxed);
        self.events_deleted.fetch_add(report.deleted as u64, Ordering::Relaxed);
    }

    pub fn record_checkins(&self, report: &CheckInReport) {
        self.guests_seen.fetch_add(report.total_guests as u64, Ordering::Relaxed);
        self.guests_checked_in.fetch_add(report.checked_in as u64, Ordering::Relaxed);
        self.guests_missing_wallet.fetch_add(report.missing_wallet as u64, Ordering::Relaxed);
        self.mints_attempted
            .fetch_add((report.minted + report.mint_failures) as u64, Ordering::Relaxed);
        self.mints_succeeded.fetch_add(report.minted as u64, Ordering::Relaxed);
        self.mints_failed.fetch_add(report.mint_failures as u64, Ordering::Relaxed);
    }

    pub fn record_pass_failure(&self) {
        self.pass_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> TelemetryStats {
        TelemetryStats {
            sync_passes: self.sync_passes.load(Ordering::Relaxed),
            checkin_passes: self.checkin_passes.load(Ordering::Relaxed),
            events_created: self.events_created.load(Ordering::Relaxed),
            events_updated: self.events_updated.load(Ordering::Relaxed),
            events_deleted: self.events_deleted.load(Ordering::Relaxed),
            guests_seen: self.guests_seen.load(Ordering::Relaxed),
            guests_checked_in: self.guests_checked_in.load(Ordering::Relaxed),
            guests_missing_wallet: self.guests_missing_wallet.load(Ordering::Relaxed),
            mints_attempted: self.mints_attempted.load(Ordering::Relaxed),
            mints_succeeded: self.mints_succeeded.load(Ordering::Relaxed),
            mints_failed: self.mints_failed.load(Ordering::Relaxed),
            pass_failures: self.pass_failures.load(Ordering::Relaxed),
            period_start: self.session_start,
            period_end: current_timestamp(),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let telemetry = TelemetryCollector::new();
        telemetry.record_sync(&SyncReport {
            created: 2,
            updated: 1,
            deleted: 1,
            ..Default::default()
        });
        telemetry.record_checkins(&CheckInReport {
            total_guests: 5,
            checked_in: 3,
            missing_wallet: 1,
            minted: 1,
            mint_failures: 1,
            ..Default::default()
        });

        let stats = telemetry.get_stats();
        assert_eq!(stats.events_created, 2);
        assert_eq!(stats.events_deleted, 1);
        assert_eq!(stats.mints_attempted, 2);
        assert_eq!(stats.mints_failed, 1);
        assert!(stats.summary().contains("SESSION REPORT"));
    }
}
