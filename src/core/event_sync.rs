//! Event reconciliation
//!
//! One pass per operator credential: `Idle → Fetching → Diffing → Applying → Idle`.
//! Creates and updates are applied before soft-deletes; running a pass twice against
//! unchanged remote data changes nothing the second time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::models::errors::AppResult;
use crate::models::types::{Event, OperatorCredential, PassReport, RemoteEvent, SyncPhase, SyncReport};
use crate::providers::luma::EventsProvider;
use crate::storage::{CredentialRepository, EventRepository};
use crate::telemetry::TelemetryCollector;
use crate::utils::clock::Clock;

/// Changes needed to bring local state in line with the provider
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub creates: Vec<Event>,
    pub updates: Vec<Event>,
    /// Ids of local, non-deleted events the provider no longer returns
    pub deletes: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Diff remote events against an operator's local events
pub fn plan_changes(local: &[Event], remote: &[RemoteEvent], operator_id: &str) -> SyncPlan {
    let known: HashMap<&str, &Event> = local.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut seen = HashSet::new();
    let mut plan = SyncPlan::default();

    for remote_event in remote {
        let id = remote_event.api_id.as_str();
        if id.is_empty() || !seen.insert(id) {
            continue;
        }
        match known.get(id) {
            None => plan.creates.push(Event::from_remote(remote_event, operator_id)),
            Some(existing) if existing.needs_update(remote_event) => {
                let mut updated = (*existing).clone();
                updated.apply_remote(remote_event);
                plan.updates.push(updated);
            }
            Some(_) => {}
        }
    }

    plan.deletes = local
        .iter()
        .filter(|e| !e.is_deleted && !seen.contains(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();

    plan
}

pub struct EventSyncReconciler {
    provider: Arc<dyn EventsProvider>,
    events: Arc<dyn EventRepository>,
    credentials: Arc<dyn CredentialRepository>,
    clock: Arc<dyn Clock>,
    operator_delay: Duration,
    telemetry: Arc<TelemetryCollector>,
    phase: Mutex<SyncPhase>,
}

impl EventSyncReconciler {
    pub fn new(
        provider: Arc<dyn EventsProvider>,
        events: Arc<dyn EventRepository>,
        credentials: Arc<dyn CredentialRepository>,
        clock: Arc<dyn Clock>,
        operator_delay: Duration,
        telemetry: Arc<TelemetryCollector>,
    ) -> Self {
        Self {
            provider,
            events,
            credentials,
            clock,
            operator_delay,
            telemetry,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase.lock().map(|p| *p).unwrap_or(SyncPhase::Idle)
    }

    fn enter(&self, operator_id: &str, phase: SyncPhase) {
        if let Ok(mut current) = self.phase.lock() {
            debug!("🔀 Operator {}: {} → {}", operator_id, current.as_str(), phase.as_str());
            *current = phase;
        }
    }

    /// Sync every operator holding a credential, sequentially
    pub async fn sync_all(&self) -> PassReport<SyncReport> {
        self.telemetry.record_sync_pass();
        let mut pass = PassReport::default();

        let operators = match self.credentials.operators_with_credentials().await {
            Ok(ops) => ops,
            Err(e) => {
                error!("❌ Cannot list operators: {}", e);
                self.telemetry.record_pass_failure();
                pass.failed.push(("*".to_string(), e.to_string()));
                return pass;
            }
        };
        info!("🔄 Event sync pass: {} operator(s)", operators.len());

        for (i, credential) in operators.iter().enumerate() {
            if i > 0 {
                self.clock.sleep(self.operator_delay).await;
            }
            match self.sync_operator(credential).await {
                Ok(report) => pass.completed.push(report),
                Err(e) => {
                    warn!("⚠️ Event sync for operator {} aborted: {}", credential.operator_id, e);
                    self.telemetry.record_pass_failure();
                    pass.failed.push((credential.operator_id.clone(), e.to_string()));
                }
            }
        }

        pass
    }

    /// One full pass for one operator. Fetch failures abort the pass; per-event
    /// write failures are collected in the report.
    pub async fn sync_operator(&self, credential: &OperatorCredential) -> AppResult<SyncReport> {
        let started = Instant::now();
        let operator_id = credential.operator_id.as_str();
        let mut report = SyncReport {
            operator_id: operator_id.to_string(),
            ..Default::default()
        };

        self.enter(operator_id, SyncPhase::Fetching);
        let fetched = self.fetch(credential).await;
        let remote = match fetched {
            Ok(remote) => remote,
            Err(e) => {
                self.enter(operator_id, SyncPhase::Idle);
                return Err(e);
            }
        };

        self.enter(operator_id, SyncPhase::Diffing);
        let local = match self.events.events_for_operator(operator_id).await {
            Ok(local) => local,
            Err(e) => {
                self.enter(operator_id, SyncPhase::Idle);
                return Err(e);
            }
        };
        let plan = plan_changes(&local, &remote, operator_id);
        debug!(
            "📋 Operator {}: {} remote, {} local, plan +{} ~{} -{}",
            operator_id,
            remote.len(),
            local.len(),
            plan.creates.len(),
            plan.updates.len(),
            plan.deletes.len()
        );

        self.enter(operator_id, SyncPhase::Applying);
        self.apply(plan, &mut report).await;
        self.enter(operator_id, SyncPhase::Idle);

        report.duration = started.elapsed();
        self.telemetry.record_sync(&report);
        if report.is_noop() {
            debug!("✅ Operator {} already in sync", operator_id);
        } else {
            info!(
                "✅ Operator {} synced: {} created, {} updated, {} deleted",
                operator_id, report.created, report.updated, report.deleted
            );
        }
        Ok(report)
    }

    async fn fetch(&self, credential: &OperatorCredential) -> AppResult<Vec<RemoteEvent>> {
        self.provider.test_credential(&credential.api_key).await?;
        self.provider.list_events(&credential.api_key).await
    }

    async fn apply(&self, plan: SyncPlan, report: &mut SyncReport) {
        for event in plan.creates {
            let id = event.id.clone();
            match self.events.create_event(event).await {
                Ok(()) => {
                    debug!("➕ Event {} created", id);
                    report.created += 1;
                }
                Err(e) => report.errors.push(format!("create {}: {}", id, e)),
            }
        }

        for event in plan.updates {
            let id = event.id.clone();
            match self.events.update_event(event).await {
                Ok(()) => {
                    debug!("✏️ Event {} updated", id);
                    report.updated += 1;
                }
                Err(e) => report.errors.push(format!("update {}: {}", id, e)),
            }
        }

        for id in plan.deletes {
            match self.events.soft_delete_event(&id).await {
                Ok(()) => {
                    debug!("🗑️ Event {} soft-deleted", id);
                    report.deleted += 1;
                }
                Err(e) => report.errors.push(format!("delete {}: {}", id, e)),
            }
        }

        for err in &report.errors {
            warn!("⚠️ {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, name: &str, updated_at: &str) -> RemoteEvent {
        RemoteEvent {
            api_id: id.into(),
            name: name.into(),
            start_at: "2024-06-01T18:00:00Z".into(),
            updated_at: Some(updated_at.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_create_update_delete() {
        let mut stale_a = Event::from_remote(&remote("a", "Old name", "t0"), "op");
        stale_a.provider_updated_at = Some("t1".into());
        let c = Event::from_remote(&remote("c", "C", "t0"), "op");

        let plan = plan_changes(&[stale_a, c], &[remote("a", "A", "t1"), remote("b", "B", "t1")], "op");

        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].id, "b");
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].name, "A");
        assert_eq!(plan.deletes, vec!["c".to_string()]);
    }

    #[test]
    fn test_plan_is_empty_when_in_sync() {
        let remote_events = vec![remote("a", "A", "t1"), remote("b", "B", "t1")];
        let local: Vec<Event> = remote_events.iter().map(|r| Event::from_remote(r, "op")).collect();
        assert!(plan_changes(&local, &remote_events, "op").is_empty());
    }

    #[test]
    fn test_deleted_events_stay_deleted_or_come_back() {
        let mut gone = Event::from_remote(&remote("a", "A", "t1"), "op");
        gone.is_deleted = true;

        assert!(plan_changes(&[gone.clone()], &[], "op").is_empty());

        let plan = plan_changes(&[gone], &[remote("a", "A", "t1")], "op");
        assert_eq!(plan.updates.len(), 1);
        assert!(!plan.updates[0].is_deleted);
    }

    #[test]
    fn test_duplicate_and_blank_remote_ids_are_ignored() {
        let plan = plan_changes(
            &[],
            &[remote("a", "A", "t1"), remote("a", "A again", "t2"), remote("", "nameless", "t1")],
            "op",
        );
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].name, "A");
    }
}
