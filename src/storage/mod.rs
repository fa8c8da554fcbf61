//! Storage Module - Repository seams
//!
//! The reconciler and check-in processor only talk to these traits. Implementations
//! serialize concurrent writes themselves.

pub mod memory;

use async_trait::async_trait;

use crate::models::errors::AppResult;
use crate::models::types::{AttendanceToken, Event, NewAttendanceToken, OperatorCredential};

pub use memory::InMemoryStore;

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Events imported by an operator, soft-deleted ones included
    async fn events_for_operator(&self, operator_id: &str) -> AppResult<Vec<Event>>;

    /// Non-deleted events of an operator
    async fn active_events(&self, operator_id: &str) -> AppResult<Vec<Event>>;

    async fn create_event(&self, event: Event) -> AppResult<()>;

    async fn update_event(&self, event: Event) -> AppResult<()>;

    async fn soft_delete_event(&self, event_id: &str) -> AppResult<()>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn token_exists(&self, event_id: &str, owner: &str) -> AppResult<bool>;

    /// Fails with `STORE_CONFLICT` if a token for (event, owner) already exists
    async fn create_token(&self, token: NewAttendanceToken) -> AppResult<AttendanceToken>;

    /// Attach the transaction hash of a submitted mint
    async fn record_mint(&self, token_id: u64, transaction_hash: &str, confirmed: bool) -> AppResult<()>;

    async fn tokens_for_event(&self, event_id: &str) -> AppResult<Vec<AttendanceToken>>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Operators holding an events-provider API key
    async fn operators_with_credentials(&self) -> AppResult<Vec<OperatorCredential>>;
}
