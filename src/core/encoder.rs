//! ink! message payloads
//!
//! A payload is the 4-byte message selector followed by the SCALE encoding of each
//! argument in declaration order: little-endian fixed-width integers, raw 32-byte
//! account ids and compact-length-prefixed UTF-8 strings.

use parity_scale_codec::Encode;
use sha2::{Digest, Sha256};
use sp_crypto_hashing::blake2_256;
use std::fmt;

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::{CREATE_EVENT_SELECTOR, MINT_NFT_SELECTOR};

/// 4-byte ink! message selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Selector ink! derives from a message label
    pub fn from_label(label: &str) -> Self {
        let hash = blake2_256(label.as_bytes());
        Self([hash[0], hash[1], hash[2], hash[3]])
    }

    /// Parse `a5a4f778` / `0xa5a4f778`
    pub fn from_hex(value: &str) -> AppResult<Self> {
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(value.trim().trim_start_matches("0x"), &mut bytes)
            .map_err(|_| AppError::invalid_argument(format!("Invalid selector {:?}", value)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Contract messages this service sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    /// `mint_nft(event_id: u64, recipient: AccountId, metadata: String)`
    MintNft {
        event_id: u64,
        recipient: [u8; 32],
        metadata: String,
    },
    /// `create_event(name: String, date: String, location: String)`
    CreateEvent {
        name: String,
        date: String,
        location: String,
    },
}

impl ContractCall {
    pub fn method_name(&self) -> &'static str {
        match self {
            ContractCall::MintNft { .. } => "mint_nft",
            ContractCall::CreateEvent { .. } => "create_event",
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match self {
            ContractCall::MintNft { metadata, .. } if metadata.is_empty() => {
                Err(AppError::invalid_argument("mint_nft metadata must not be empty"))
            }
            ContractCall::CreateEvent { name, date, location } => {
                for (field, value) in [("name", name), ("date", date), ("location", location)] {
                    if value.trim().is_empty() {
                        return Err(AppError::invalid_argument(format!(
                            "create_event {} must not be empty",
                            field
                        )));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Encodes contract messages with the deployed contract's selectors
#[derive(Debug, Clone)]
pub struct CallEncoder {
    mint_selector: Selector,
    create_event_selector: Selector,
}

impl CallEncoder {
    pub fn new(mint_selector: Selector, create_event_selector: Selector) -> Self {
        Self {
            mint_selector,
            create_event_selector,
        }
    }

    pub fn encode(&self, call: &ContractCall) -> AppResult<Vec<u8>> {
        call.validate()?;
        Ok(match call {
            ContractCall::MintNft {
                event_id,
                recipient,
                metadata,
            } => encode_mint(self.mint_selector, *event_id, recipient, metadata),
            ContractCall::CreateEvent { name, date, location } => {
                encode_create_event(self.create_event_selector, name, date, location)
            }
        })
    }
}

impl Default for CallEncoder {
    fn default() -> Self {
        Self::new(Selector(MINT_NFT_SELECTOR), Selector(CREATE_EVENT_SELECTOR))
    }
}

pub fn encode_mint(selector: Selector, event_id: u64, recipient: &[u8; 32], metadata: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 8 + 32 + 5 + metadata.len());
    out.extend_from_slice(&selector.0);
    event_id.encode_to(&mut out);
    out.extend_from_slice(recipient);
    metadata.encode_to(&mut out);
    out
}

pub fn encode_create_event(selector: Selector, name: &str, date: &str, location: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 15 + name.len() + date.len() + location.len());
    out.extend_from_slice(&selector.0);
    name.encode_to(&mut out);
    date.encode_to(&mut out);
    location.encode_to(&mut out);
    out
}

/// Contract-side numeric id for a provider event id.
///
/// Numeric ids are used as-is; anything else maps to the first 8 bytes (big-endian)
/// of its SHA-256 digest.
pub fn contract_event_id(provider_id: &str) -> u64 {
    if let Ok(n) = provider_id.trim().parse::<u64>() {
        return n;
    }
    let digest = Sha256::digest(provider_id.as_bytes());
    let mut first = [0u8; 8];
    first.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_mint_layout() {
        let selector = Selector(MINT_NFT_SELECTOR);
        let out = encode_mint(selector, 1, &[0u8; 32], "{}");

        let mut expected = vec![0xa5, 0xa4, 0xf7, 0x78];
        expected.extend([0x01, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend([0u8; 32]);
        expected.extend([0x08, 0x7b, 0x7d]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_string_length_prefix_boundary() {
        let selector = Selector([0; 4]);
        let short = encode_mint(selector, 0, &[0u8; 32], &"a".repeat(63));
        assert_eq!(short[44], 63 << 2);
        assert_eq!(short.len(), 44 + 1 + 63);

        let long = encode_mint(selector, 0, &[0u8; 32], &"a".repeat(64));
        assert_eq!(&long[44..46], &[0x01, 0x01]);
        assert_eq!(long.len(), 44 + 2 + 64);
    }

    #[test]
    fn test_encode_create_event() {
        let encoder = CallEncoder::default();
        let out = encoder
            .encode(&ContractCall::CreateEvent {
                name: "Hack".into(),
                date: "2024".into(),
                location: "Berlin".into(),
            })
            .unwrap();
        let mut expected = CREATE_EVENT_SELECTOR.to_vec();
        expected.extend([16, b'H', b'a', b'c', b'k']);
        expected.extend([16, b'2', b'0', b'2', b'4']);
        expected.extend([24, b'B', b'e', b'r', b'l', b'i', b'n']);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_validation_rejects_empty_fields() {
        let encoder = CallEncoder::default();
        let err = encoder
            .encode(&ContractCall::CreateEvent {
                name: "Hack".into(),
                date: " ".into(),
                location: "Berlin".into(),
            })
            .unwrap_err();
        assert_eq!(err.code, crate::models::errors::ErrorCode::EncodeInvalidArgument);

        assert!(encoder
            .encode(&ContractCall::MintNft { event_id: 1, recipient: [0; 32], metadata: String::new() })
            .is_err());
    }

    #[test]
    fn test_selector_parsing() {
        assert_eq!(Selector::from_hex("0xa5a4f778").unwrap(), Selector(MINT_NFT_SELECTOR));
        assert_eq!(Selector::from_hex("a5a4f778").unwrap().to_string(), "0xa5a4f778");
        assert!(Selector::from_hex("a5a4").is_err());
        assert_eq!(Selector::from_label("create_event"), Selector(CREATE_EVENT_SELECTOR));
    }

    #[test]
    fn test_contract_event_id() {
        assert_eq!(contract_event_id("42"), 42);
        let hashed = contract_event_id("evt-abc123");
        assert_eq!(hashed, contract_event_id("evt-abc123"));
        assert_ne!(hashed, contract_event_id("evt-abc124"));
    }
}
