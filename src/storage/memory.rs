//! In-memory repository backed by DashMap.
//!
//! Used by the binary when no external store is wired in, and by tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{AttendanceToken, Event, NewAttendanceToken, OperatorCredential};
use crate::storage::{CredentialRepository, EventRepository, TokenRepository};

#[derive(Clone, Default)]
pub struct InMemoryStore {
    /// event id -> event
    events: Arc<DashMap<String, Event>>,
    /// (event id, owner) -> token
    tokens: Arc<DashMap<(String, String), AttendanceToken>>,
    /// operator id -> credential
    credentials: Arc<DashMap<String, OperatorCredential>>,
    next_token_id: Arc<AtomicU64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: impl IntoIterator<Item = OperatorCredential>) -> Self {
        let store = Self::new();
        for cred in credentials {
            store.put_credential(cred);
        }
        store
    }

    pub fn put_credential(&self, credential: OperatorCredential) {
        self.credentials.insert(credential.operator_id.clone(), credential);
    }

    pub fn get_event(&self, event_id: &str) -> Option<Event> {
        self.events.get(event_id).map(|e| e.clone())
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn all_tokens(&self) -> Vec<AttendanceToken> {
        let mut tokens: Vec<_> = self.tokens.iter().map(|t| t.value().clone()).collect();
        tokens.sort_by_key(|t| t.id);
        tokens
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn events_for_operator(&self, operator_id: &str) -> AppResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.operator_id == operator_id)
            .map(|e| e.value().clone())
            .collect();
        events.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(events)
    }

    async fn active_events(&self, operator_id: &str) -> AppResult<Vec<Event>> {
        let mut events = self.events_for_operator(operator_id).await?;
        events.retain(|e| !e.is_deleted);
        Ok(events)
    }

    async fn create_event(&self, event: Event) -> AppResult<()> {
        match self.events.entry(event.id.clone()) {
            Entry::Occupied(_) => Err(AppError::new(
                ErrorCode::StoreConflict,
                format!("Event {} already exists", event.id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(event);
                Ok(())
            }
        }
    }

    async fn update_event(&self, event: Event) -> AppResult<()> {
        match self.events.get_mut(&event.id) {
            Some(mut existing) => {
                *existing = event;
                Ok(())
            }
            None => Err(AppError::new(
                ErrorCode::StoreNotFound,
                format!("Event {} not found", event.id),
            )),
        }
    }

    async fn soft_delete_event(&self, event_id: &str) -> AppResult<()> {
        match self.events.get_mut(event_id) {
            Some(mut existing) => {
                existing.is_deleted = true;
                existing.last_synced_at = Utc::now();
                Ok(())
            }
            None => Err(AppError::new(
                ErrorCode::StoreNotFound,
                format!("Event {} not found", event_id),
            )),
        }
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn token_exists(&self, event_id: &str, owner: &str) -> AppResult<bool> {
        Ok(self
            .tokens
            .contains_key(&(event_id.to_string(), owner.to_string())))
    }

    async fn create_token(&self, token: NewAttendanceToken) -> AppResult<AttendanceToken> {
        match self.tokens.entry((token.event_id.clone(), token.owner.clone())) {
            Entry::Occupied(_) => Err(AppError::new(
                ErrorCode::StoreConflict,
                format!("Token for {} at event {} already exists", token.owner, token.event_id),
            )),
            Entry::Vacant(slot) => {
                let record = AttendanceToken {
                    id: self.next_token_id.fetch_add(1, Ordering::Relaxed) + 1,
                    event_id: token.event_id,
                    owner: token.owner,
                    metadata: token.metadata,
                    transaction_hash: None,
                    confirmed: false,
                    created_at: Utc::now(),
                };
                debug!("💾 Token #{} stored", record.id);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn record_mint(&self, token_id: u64, transaction_hash: &str, confirmed: bool) -> AppResult<()> {
        let mut token = self
            .tokens
            .iter_mut()
            .find(|t| t.id == token_id)
            .ok_or_else(|| AppError::new(ErrorCode::StoreNotFound, format!("Token #{} not found", token_id)))?;
        token.transaction_hash = Some(transaction_hash.to_string());
        token.confirmed = confirmed;
        Ok(())
    }

    async fn tokens_for_event(&self, event_id: &str) -> AppResult<Vec<AttendanceToken>> {
        let mut tokens: Vec<_> = self
            .tokens
            .iter()
            .filter(|t| t.event_id == event_id)
            .map(|t| t.value().clone())
            .collect();
        tokens.sort_by_key(|t| t.id);
        Ok(tokens)
    }
}

#[async_trait]
impl CredentialRepository for InMemoryStore {
    async fn operators_with_credentials(&self) -> AppResult<Vec<OperatorCredential>> {
        let mut creds: Vec<_> = self.credentials.iter().map(|c| c.value().clone()).collect();
        creds.sort_by(|a, b| a.operator_id.cmp(&b.operator_id));
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::RemoteEvent;

    fn event(id: &str) -> Event {
        Event::from_remote(
            &RemoteEvent {
                api_id: id.into(),
                name: "Meetup".into(),
                ..Default::default()
            },
            "op",
        )
    }

    #[tokio::test]
    async fn test_token_uniqueness() {
        let store = InMemoryStore::new();
        let new = || NewAttendanceToken {
            event_id: "evt".into(),
            owner: "wallet".into(),
            metadata: serde_json::json!({}),
        };
        let token = store.create_token(new()).await.unwrap();
        assert_eq!(token.id, 1);
        assert!(store.token_exists("evt", "wallet").await.unwrap());

        let err = store.create_token(new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::StoreConflict);
        assert_eq!(store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_record_mint() {
        let store = InMemoryStore::new();
        let token = store
            .create_token(NewAttendanceToken {
                event_id: "evt".into(),
                owner: "wallet".into(),
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();
        store.record_mint(token.id, "0xfeed", true).await.unwrap();

        let stored = &store.tokens_for_event("evt").await.unwrap()[0];
        assert_eq!(stored.transaction_hash.as_deref(), Some("0xfeed"));
        assert!(stored.confirmed);
        assert!(store.record_mint(99, "0x", true).await.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let store = InMemoryStore::new();
        store.create_event(event("a")).await.unwrap();
        store.create_event(event("b")).await.unwrap();
        store.soft_delete_event("a").await.unwrap();

        assert_eq!(store.events_for_operator("op").await.unwrap().len(), 2);
        let active = store.active_events("op").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "b");
        assert!(store.get_event("a").unwrap().is_deleted);
    }
}
