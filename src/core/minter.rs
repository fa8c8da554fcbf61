//! Mint pipeline: recipient address → call payload → signed submission.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::contract::ContractContext;
use crate::core::encoder::{contract_event_id, ContractCall};
use crate::core::submitter::TransactionSubmitter;
use crate::models::errors::AppResult;
use crate::models::types::{Event, MintResult};
use crate::utils::address::AddressCodec;

pub struct AttendanceMinter {
    contract: Arc<ContractContext>,
    submitter: Arc<dyn TransactionSubmitter>,
}

impl AttendanceMinter {
    pub fn new(contract: Arc<ContractContext>, submitter: Arc<dyn TransactionSubmitter>) -> Self {
        Self { contract, submitter }
    }

    /// Mint for a synchronous caller; failures are reported in the result
    pub async fn mint(&self, provider_event_id: &str, recipient: &str, metadata: &serde_json::Value) -> MintResult {
        match self.try_mint(provider_event_id, recipient, metadata).await {
            Ok(hash) => MintResult::minted(hash),
            Err(e) => {
                warn!("❌ Mint for event {} failed [{}]: {}", provider_event_id, e.code_str(), e.message);
                MintResult::failed(e.to_string())
            }
        }
    }

    pub async fn try_mint(
        &self,
        provider_event_id: &str,
        recipient: &str,
        metadata: &serde_json::Value,
    ) -> AppResult<String> {
        let decoded = AddressCodec::decode(recipient);
        let recipient_key = decoded.account_id()?;
        if !decoded.is_valid() {
            warn!("⚠️ Minting to {} decoded with the {} strategy", recipient, decoded.strategy.as_str());
        }

        let call = ContractCall::MintNft {
            event_id: contract_event_id(provider_event_id),
            recipient: recipient_key,
            metadata: metadata.to_string(),
        };
        let payload = self.contract.encoder().encode(&call)?;
        let hash = self.submitter.submit(&payload, self.contract.account_id()).await?;

        info!("🎟️ Minted attendance token for event {} → {}", provider_event_id, hash);
        Ok(hash)
    }

    /// Register an event on the contract
    pub async fn create_event(&self, name: &str, date: &str, location: &str) -> MintResult {
        let call = ContractCall::CreateEvent {
            name: name.to_string(),
            date: date.to_string(),
            location: location.to_string(),
        };
        let result = match self.contract.encoder().encode(&call) {
            Ok(payload) => self.submitter.submit(&payload, self.contract.account_id()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(hash) => {
                info!("📅 Event {:?} registered on chain: {}", name, hash);
                MintResult::minted(hash)
            }
            Err(e) => {
                warn!("❌ create_event failed [{}]: {}", e.code_str(), e.message);
                MintResult::failed(e.to_string())
            }
        }
    }
}

/// Token metadata: event details, attendee and check-in time
pub fn mint_metadata(event: &Event, attendee: &str, checked_in_at: DateTime<Utc>) -> serde_json::Value {
    let checked_in = checked_in_at.to_rfc3339();
    json!({
        "name": format!("Attendance: {}", event.name),
        "description": format!("Proof of attendance for {} on {}", event.name, event.date),
        "event_id": event.id,
        "event_name": event.name,
        "event_date": event.date,
        "location": event.location,
        "attendee": attendee,
        "attributes": [
            {"trait_type": "Event", "value": event.name},
            {"trait_type": "Date", "value": event.date},
            {"trait_type": "Location", "value": event.location},
            {"trait_type": "Attendee", "value": attendee},
            {"trait_type": "Check-in Time", "value": checked_in},
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::encoder::CallEncoder;
    use crate::models::errors::{AppError, ErrorCode};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSubmitter {
        calls: Mutex<Vec<(Vec<u8>, [u8; 32])>>,
        fail: bool,
    }

    #[async_trait]
    impl TransactionSubmitter for RecordingSubmitter {
        async fn submit(&self, call_data: &[u8], destination: &[u8; 32]) -> AppResult<String> {
            if self.fail {
                return Err(AppError::new(ErrorCode::ChainSubmission, "pool rejected"));
            }
            self.calls.lock().unwrap().push((call_data.to_vec(), *destination));
            Ok("0xabc".into())
        }
    }

    fn minter(submitter: Arc<RecordingSubmitter>) -> AttendanceMinter {
        let contract = ContractContext::resolve(
            &AddressCodec::encode(&[5u8; 32], 42).unwrap(),
            CallEncoder::default(),
        )
        .unwrap();
        AttendanceMinter::new(Arc::new(contract), submitter)
    }

    #[tokio::test]
    async fn test_mint_sends_payload_to_contract() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let recipient = AddressCodec::encode(&[7u8; 32], 42).unwrap();

        let result = minter(submitter.clone()).mint("12", &recipient, &json!({})).await;
        assert_eq!(result, MintResult::minted("0xabc"));

        let calls = submitter.calls.lock().unwrap();
        let (payload, destination) = &calls[0];
        assert_eq!(destination, &[5u8; 32]);
        assert_eq!(&payload[4..12], &12u64.to_le_bytes());
        assert_eq!(&payload[12..44], &[7u8; 32]);
    }

    #[tokio::test]
    async fn test_mint_refuses_unparseable_recipient() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let result = minter(submitter.clone()).mint("12", "not a wallet", &json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("ADDR_NOT_AN_ACCOUNT"));
        assert!(submitter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mint_surfaces_submission_error() {
        let submitter = Arc::new(RecordingSubmitter { fail: true, ..Default::default() });
        let recipient = AddressCodec::encode(&[7u8; 32], 42).unwrap();
        let result = minter(submitter).mint("12", &recipient, &json!({})).await;
        assert_eq!(result.error.as_deref(), Some("[CHAIN_SUBMISSION] pool rejected"));
    }

    #[tokio::test]
    async fn test_create_event_validates_arguments() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let result = minter(submitter.clone()).create_event("", "2024-06-01", "Berlin").await;
        assert!(!result.success);
        assert!(submitter.calls.lock().unwrap().is_empty());

        let result = minter(submitter.clone()).create_event("Meetup", "2024-06-01", "Berlin").await;
        assert!(result.success);
    }

    #[test]
    fn test_mint_metadata_fields() {
        let event = Event {
            id: "evt-1".into(),
            name: "Rust Meetup".into(),
            date: "2024-06-01".into(),
            location: "Berlin".into(),
            url: String::new(),
            operator_id: "op".into(),
            provider_updated_at: None,
            last_synced_at: Utc::now(),
            is_deleted: false,
        };
        let meta = mint_metadata(&event, "Ada", Utc::now());
        assert_eq!(meta["name"], "Attendance: Rust Meetup");
        assert_eq!(meta["attendee"], "Ada");
        assert_eq!(meta["attributes"].as_array().unwrap().len(), 5);
    }
}
