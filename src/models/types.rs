//! Core domain types: local events, attendance tokens, operator credentials,
//! provider payloads and pass reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_EVENT_LOCATION, WALLET_ANSWER_LABELS, WALLET_FIELD_NAMES,
};

// ============================================
// Local state
// ============================================

/// An event imported from the events provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Provider-assigned identifier (`api_id`)
    pub id: String,
    pub name: String,
    /// Provider `start_at`
    pub date: String,
    pub location: String,
    pub url: String,
    /// Internal user account that imported this event
    pub operator_id: String,
    /// Provider-side `updated_at` marker
    pub provider_updated_at: Option<String>,
    pub last_synced_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Event {
    /// Build a fresh local record from a remote event
    pub fn from_remote(remote: &RemoteEvent, operator_id: &str) -> Self {
        Self {
            id: remote.api_id.clone(),
            name: remote.name.clone(),
            date: remote.start_at.clone(),
            location: remote.location(),
            url: remote.url.clone(),
            operator_id: operator_id.to_string(),
            provider_updated_at: remote.updated_at.clone(),
            last_synced_at: Utc::now(),
            is_deleted: false,
        }
    }

    /// Whether the stored record differs from what the provider reports now.
    ///
    /// The marker comparison comes first; the field comparison catches providers
    /// that do not bump `updated_at` reliably.
    pub fn needs_update(&self, remote: &RemoteEvent) -> bool {
        if self.is_deleted {
            return true;
        }
        if self.provider_updated_at != remote.updated_at {
            return true;
        }
        self.name != remote.name
            || self.date != remote.start_at
            || self.location != remote.location()
            || self.url != remote.url
    }

    /// Overwrite provider-owned fields and restore the record if it was soft-deleted
    pub fn apply_remote(&mut self, remote: &RemoteEvent) {
        self.name = remote.name.clone();
        self.date = remote.start_at.clone();
        self.location = remote.location();
        self.url = remote.url.clone();
        self.provider_updated_at = remote.updated_at.clone();
        self.last_synced_at = Utc::now();
        self.is_deleted = false;
    }
}

/// Attendance NFT record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceToken {
    pub id: u64,
    pub event_id: String,
    /// Owner wallet, chain-native encoded
    pub owner: String,
    pub metadata: serde_json::Value,
    pub transaction_hash: Option<String>,
    pub confirmed: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a token record; the store assigns id and timestamp
#[derive(Debug, Clone)]
pub struct NewAttendanceToken {
    pub event_id: String,
    pub owner: String,
    pub metadata: serde_json::Value,
}

/// An operator's provider API key, scoped to one internal user account
#[derive(Clone, Serialize, Deserialize)]
pub struct OperatorCredential {
    pub operator_id: String,
    pub api_key: String,
}

impl OperatorCredential {
    pub fn new(operator_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            api_key: api_key.into(),
        }
    }
}

// Keys never reach the logs.
impl std::fmt::Debug for OperatorCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorCredential")
            .field("operator_id", &self.operator_id)
            .field("api_key", &"***HIDDEN***")
            .finish()
    }
}

/// Outcome of a single mint attempt, returned to callers that trigger minting synchronously
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MintResult {
    pub fn minted(transaction_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_hash: Some(transaction_hash.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_hash: None,
            error: Some(error.into()),
        }
    }
}

// ============================================
// Events provider payloads
// ============================================

/// Event as returned by the events provider
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteEvent {
    #[serde(default)]
    pub api_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub start_at: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub geo_address_json: Option<GeoAddress>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoAddress {
    #[serde(default)]
    pub address: Option<String>,
}

impl RemoteEvent {
    /// Street address, else timezone, else "Online"
    pub fn location(&self) -> String {
        if let Some(address) = self
            .geo_address_json
            .as_ref()
            .and_then(|g| g.address.as_deref())
            .filter(|a| !a.is_empty())
        {
            return address.to_string();
        }
        match self.timezone.as_deref() {
            Some(tz) if !tz.is_empty() => tz.to_string(),
            _ => DEFAULT_EVENT_LOCATION.to_string(),
        }
    }
}

/// One registration-form answer attached to a guest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegistrationAnswer {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub answer: Option<serde_json::Value>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl RegistrationAnswer {
    /// Whether either prompt field names a wallet
    fn asks_for_wallet(&self) -> bool {
        [self.label.as_deref(), self.question.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .any(|prompt| WALLET_ANSWER_LABELS.iter().any(|label| label.eq_ignore_ascii_case(prompt)))
    }

    /// First non-empty of `answer`, `value`
    fn text(&self) -> Option<String> {
        [self.answer.as_ref(), self.value.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|v| non_empty(v.as_str()?))
    }
}

/// Guest record from the provider's guest list
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Guest {
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Check-in timestamp; some payloads carry a bare boolean instead
    #[serde(default)]
    pub checked_in_at: Option<serde_json::Value>,
    #[serde(default)]
    pub custom_data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub registration_answers: Vec<RegistrationAnswer>,
    /// Everything else, searched for top-level wallet fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Guest {
    pub fn is_checked_in(&self) -> bool {
        match &self.checked_in_at {
            Some(serde_json::Value::String(ts)) => !ts.trim().is_empty(),
            Some(serde_json::Value::Bool(flag)) => *flag,
            _ => false,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unknown")
    }

    /// Wallet address lookup, in order: structured custom fields, labeled
    /// registration answers, direct top-level fields.
    pub fn wallet_address(&self) -> Option<String> {
        self.wallet_from_custom_data()
            .or_else(|| self.wallet_from_answers())
            .or_else(|| self.wallet_from_fields())
    }

    fn wallet_from_custom_data(&self) -> Option<String> {
        let data = self.custom_data.as_ref()?;
        WALLET_FIELD_NAMES
            .iter()
            .find_map(|field| non_empty(data.get(*field)?.as_str()?))
    }

    fn wallet_from_answers(&self) -> Option<String> {
        self.registration_answers
            .iter()
            .filter(|answer| answer.asks_for_wallet())
            .find_map(RegistrationAnswer::text)
    }

    fn wallet_from_fields(&self) -> Option<String> {
        WALLET_FIELD_NAMES
            .iter()
            .find_map(|field| non_empty(self.extra.get(*field)?.as_str()?))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================
// Pass reports
// ============================================

/// Phases of one reconciliation pass for a single operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Diffing,
    Applying,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Applying => "applying",
        }
    }
}

/// Result of syncing one operator's events
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub operator_id: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

/// Result of processing one event's guest list
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckInReport {
    pub event_id: String,
    pub total_guests: usize,
    pub checked_in: usize,
    pub missing_wallet: usize,
    /// Wallet present but not decodable to an account
    pub invalid_wallet: usize,
    pub already_minted: usize,
    pub minted: usize,
    pub mint_failures: usize,
    pub errors: Vec<String>,
}

/// Per-operator outcome of a whole pass
#[derive(Debug, Default)]
pub struct PassReport<T> {
    pub completed: Vec<T>,
    /// Operators (or events) whose pass aborted early, with the reason
    pub failed: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guest(value: serde_json::Value) -> Guest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_location_fallbacks() {
        let mut remote = RemoteEvent {
            geo_address_json: Some(GeoAddress { address: Some("Berlin".into()) }),
            timezone: Some("Europe/Berlin".into()),
            ..Default::default()
        };
        assert_eq!(remote.location(), "Berlin");
        remote.geo_address_json = None;
        assert_eq!(remote.location(), "Europe/Berlin");
        remote.timezone = None;
        assert_eq!(remote.location(), "Online");
    }

    #[test]
    fn test_checked_in_accepts_timestamp_or_flag() {
        assert!(guest(json!({"checked_in_at": "2024-05-01T10:00:00Z"})).is_checked_in());
        assert!(guest(json!({"checked_in_at": true})).is_checked_in());
        assert!(!guest(json!({"checked_in_at": null})).is_checked_in());
        assert!(!guest(json!({"checked_in_at": ""})).is_checked_in());
        assert!(!guest(json!({"name": "x"})).is_checked_in());
    }

    #[test]
    fn test_wallet_strategy_order() {
        let g = guest(json!({
            "custom_data": {"polkadot_wallet": "custom"},
            "registration_answers": [{"label": "Wallet Address", "answer": "answer"}],
            "wallet_address": "direct"
        }));
        assert_eq!(g.wallet_address().as_deref(), Some("custom"));

        let g = guest(json!({
            "registration_answers": [
                {"label": "Dietary needs", "answer": "none"},
                {"question": "polkadot address", "value": " answer "}
            ],
            "wallet_address": "direct"
        }));
        assert_eq!(g.wallet_address().as_deref(), Some("answer"));

        let g = guest(json!({"substrate_wallet": "direct"}));
        assert_eq!(g.wallet_address().as_deref(), Some("direct"));
    }

    #[test]
    fn test_wallet_prompt_in_question_behind_unrelated_label() {
        let g = guest(json!({
            "registration_answers": [
                {"label": "Question 3", "question": "Wallet Address", "value": "5Grw"}
            ]
        }));
        assert_eq!(g.wallet_address().as_deref(), Some("5Grw"));
    }

    #[test]
    fn test_wallet_value_used_when_answer_is_blank() {
        let g = guest(json!({
            "registration_answers": [
                {"question": "Wallet Address", "answer": "", "value": "5Grw"}
            ]
        }));
        assert_eq!(g.wallet_address().as_deref(), Some("5Grw"));

        let g = guest(json!({
            "registration_answers": [
                {"question": "Wallet Address", "answer": " ", "value": null},
                {"label": "DOT Address", "answer": "5Fallback"}
            ]
        }));
        assert_eq!(g.wallet_address().as_deref(), Some("5Fallback"));
    }

    #[test]
    fn test_wallet_missing() {
        let g = guest(json!({
            "name": "Ada",
            "checked_in_at": "2024-05-01T10:00:00Z",
            "custom_data": {"wallet": ""},
            "registration_answers": [{"label": "Company", "answer": "ACME"}]
        }));
        assert!(g.wallet_address().is_none());
    }

    #[test]
    fn test_needs_update_detects_field_drift() {
        let remote = RemoteEvent {
            api_id: "evt-1".into(),
            name: "Meetup".into(),
            start_at: "2024-06-01".into(),
            updated_at: Some("t1".into()),
            ..Default::default()
        };
        let mut local = Event::from_remote(&remote, "op");
        assert!(!local.needs_update(&remote));

        local.name = "Old name".into();
        assert!(local.needs_update(&remote));

        local.apply_remote(&remote);
        assert!(!local.needs_update(&remote));

        local.is_deleted = true;
        assert!(local.needs_update(&remote));
    }

    #[test]
    fn test_credential_debug_hides_key() {
        let cred = OperatorCredential::new("7", "secret-key");
        assert!(!format!("{:?}", cred).contains("secret-key"));
    }
}
