//! SS58 address codec
//!
//! Layout of a decoded address: `prefix (1 or 2 bytes) ++ public key (32) ++ checksum (2)`,
//! where the checksum is the first two bytes of `blake2_512("SS58PRE" ++ prefix ++ key)`.
//!
//! `decode` never fails: strict decoding first, then a lenient parse that ignores the
//! checksum, then a hashed pseudo-identifier. Callers must check [`DecodedAddress::is_account`]
//! before using the key as a chain destination.

use sha2::{Digest, Sha256};
use sp_crypto_hashing::blake2_512;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::errors::{AppError, ErrorCode};
use crate::utils::constants::{
    DEFAULT_SS58_PREFIX, LENIENT_MAX_ZERO_BYTES, SS58_CHECKSUM_LEN, SS58_CHECKSUM_PREFIX,
};

/// Length of an account public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Highest network id representable in the two-byte prefix form
pub const MAX_NETWORK_ID: u16 = 0x3fff;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("invalid base58 encoding")]
    InvalidBase58,
    #[error("invalid hex account id")]
    InvalidHex,
    #[error("reserved address prefix byte {0:#04x}")]
    ReservedPrefix(u8),
    #[error("unexpected decoded length {0}")]
    InvalidLength(usize),
    #[error("checksum mismatch")]
    BadChecksum,
    #[error("extracted key looks invalid ({0} zero bytes)")]
    SuspiciousKey(usize),
    #[error("network id {0} out of range")]
    NetworkOutOfRange(u16),
}

impl From<AddressError> for AppError {
    fn from(err: AddressError) -> Self {
        AppError::with_source(ErrorCode::AddressInvalid, err.to_string(), err)
    }
}

/// Which decoding strategy produced a [`DecodedAddress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// `0x`-prefixed 64-char hex account id
    Hex,
    /// Base58 with verified checksum
    Strict,
    /// Base58 layout parsed, checksum not verified
    Lenient,
    /// SHA-256 of the raw string; not a real account
    HashFallback,
}

impl DecodeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeStrategy::Hex => "hex",
            DecodeStrategy::Strict => "strict",
            DecodeStrategy::Lenient => "lenient",
            DecodeStrategy::HashFallback => "hash-fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub network_id: u16,
    pub public_key: [u8; PUBLIC_KEY_LEN],
    pub strategy: DecodeStrategy,
}

impl DecodedAddress {
    /// Checksum (or hex form) verified
    pub fn is_valid(&self) -> bool {
        matches!(self.strategy, DecodeStrategy::Strict | DecodeStrategy::Hex)
    }

    /// The key belongs to a real account and may be used on chain
    pub fn is_account(&self) -> bool {
        self.strategy != DecodeStrategy::HashFallback
    }

    /// Key usable as a chain destination, or `ADDR_NOT_AN_ACCOUNT`
    pub fn account_id(&self) -> Result<[u8; PUBLIC_KEY_LEN], AppError> {
        if self.is_account() {
            Ok(self.public_key)
        } else {
            Err(AppError::new(
                ErrorCode::AddressNotAnAccount,
                "address only resolved to a hashed pseudo-identifier",
            ))
        }
    }
}

/// Stateless SS58 encoder/decoder
pub struct AddressCodec;

impl AddressCodec {
    /// Total decode: hex, strict, lenient, then hash fallback
    pub fn decode(address: &str) -> DecodedAddress {
        let address = address.trim();

        if let Some(hex_part) = address.strip_prefix("0x") {
            match Self::decode_hex(hex_part) {
                Ok(public_key) => {
                    debug!("🔑 Address decoded from hex form");
                    return DecodedAddress {
                        network_id: DEFAULT_SS58_PREFIX,
                        public_key,
                        strategy: DecodeStrategy::Hex,
                    };
                }
                Err(e) => warn!("⚠️ Hex address rejected: {}", e),
            }
        } else {
            match Self::decode_strict(address) {
                Ok((network_id, public_key)) => {
                    debug!("✅ Strict SS58 decode succeeded (network {})", network_id);
                    return DecodedAddress {
                        network_id,
                        public_key,
                        strategy: DecodeStrategy::Strict,
                    };
                }
                Err(e) => warn!("⚠️ Strict SS58 decode failed: {}", e),
            }

            match Self::decode_lenient(address) {
                Ok((network_id, public_key)) => {
                    warn!(
                        "⚠️ Address checksum ignored, key extracted (network {}, key {}...)",
                        network_id,
                        hex::encode(&public_key[..4])
                    );
                    return DecodedAddress {
                        network_id,
                        public_key,
                        strategy: DecodeStrategy::Lenient,
                    };
                }
                Err(e) => warn!("⚠️ Lenient SS58 decode failed: {}", e),
            }
        }

        warn!("🔄 Using hash-based pseudo-identifier for unparseable address");
        DecodedAddress {
            network_id: DEFAULT_SS58_PREFIX,
            public_key: Sha256::digest(address.as_bytes()).into(),
            strategy: DecodeStrategy::HashFallback,
        }
    }

    /// Decode with checksum verification
    pub fn decode_strict(address: &str) -> Result<(u16, [u8; PUBLIC_KEY_LEN]), AddressError> {
        let raw = Self::base58(address)?;
        let (network_id, prefix_len) = Self::split_prefix(&raw)?;
        let public_key = Self::extract_key(&raw, prefix_len)?;

        let body_len = raw.len() - SS58_CHECKSUM_LEN;
        if raw[body_len..] != checksum(&raw[..body_len])[..SS58_CHECKSUM_LEN] {
            return Err(AddressError::BadChecksum);
        }
        Ok((network_id, public_key))
    }

    /// Decode the prefix/key layout without verifying the checksum
    pub fn decode_lenient(address: &str) -> Result<(u16, [u8; PUBLIC_KEY_LEN]), AddressError> {
        let raw = Self::base58(address)?;
        let (network_id, prefix_len) = Self::split_prefix(&raw)?;
        let public_key = Self::extract_key(&raw, prefix_len)?;

        let zeros = public_key.iter().filter(|b| **b == 0).count();
        if zeros >= LENIENT_MAX_ZERO_BYTES {
            return Err(AddressError::SuspiciousKey(zeros));
        }
        Ok((network_id, public_key))
    }

    /// Encode a public key for a network, with checksum
    pub fn encode(public_key: &[u8; PUBLIC_KEY_LEN], network_id: u16) -> Result<String, AddressError> {
        let mut body = Vec::with_capacity(2 + PUBLIC_KEY_LEN + SS58_CHECKSUM_LEN);
        match network_id {
            0..=63 => body.push(network_id as u8),
            64..=MAX_NETWORK_ID => {
                let first = ((network_id & 0b0000_0000_1111_1100) as u8 >> 2) | 0b0100_0000;
                let second = ((network_id >> 8) as u8) | (((network_id & 0b11) as u8) << 6);
                body.push(first);
                body.push(second);
            }
            _ => return Err(AddressError::NetworkOutOfRange(network_id)),
        }
        body.extend_from_slice(public_key);
        let sum = checksum(&body);
        body.extend_from_slice(&sum[..SS58_CHECKSUM_LEN]);
        Ok(bs58::encode(body).into_string())
    }

    /// Re-encode an address with a correct checksum.
    ///
    /// Returns the corrected address and whether the input was already valid.
    pub fn normalize(address: &str) -> Result<(String, bool), AddressError> {
        let trimmed = address.trim();
        if Self::decode_strict(trimmed).is_ok() {
            return Ok((trimmed.to_string(), true));
        }
        let (network_id, public_key) = Self::decode_lenient(trimmed)?;
        Ok((Self::encode(&public_key, network_id)?, false))
    }

    fn decode_hex(hex_part: &str) -> Result<[u8; PUBLIC_KEY_LEN], AddressError> {
        if hex_part.len() != PUBLIC_KEY_LEN * 2 {
            return Err(AddressError::InvalidHex);
        }
        let mut key = [0u8; PUBLIC_KEY_LEN];
        hex::decode_to_slice(hex_part, &mut key).map_err(|_| AddressError::InvalidHex)?;
        Ok(key)
    }

    fn base58(address: &str) -> Result<Vec<u8>, AddressError> {
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        bs58::decode(address)
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)
    }

    /// Network id and prefix length
    fn split_prefix(raw: &[u8]) -> Result<(u16, usize), AddressError> {
        match raw.first() {
            None => Err(AddressError::InvalidLength(0)),
            Some(&b0) if b0 < 64 => Ok((b0 as u16, 1)),
            Some(&b0) if b0 < 128 => {
                let b1 = *raw.get(1).ok_or(AddressError::InvalidLength(raw.len()))?;
                let lower = (b0 << 2) | (b1 >> 6);
                let upper = b1 & 0b0011_1111;
                Ok((lower as u16 | ((upper as u16) << 8), 2))
            }
            Some(&b0) => Err(AddressError::ReservedPrefix(b0)),
        }
    }

    fn extract_key(raw: &[u8], prefix_len: usize) -> Result<[u8; PUBLIC_KEY_LEN], AddressError> {
        if raw.len() != prefix_len + PUBLIC_KEY_LEN + SS58_CHECKSUM_LEN {
            return Err(AddressError::InvalidLength(raw.len()));
        }
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(&raw[prefix_len..prefix_len + PUBLIC_KEY_LEN]);
        Ok(key)
    }
}

fn checksum(body: &[u8]) -> [u8; 64] {
    let mut preimage = Vec::with_capacity(SS58_CHECKSUM_PREFIX.len() + body.len());
    preimage.extend_from_slice(SS58_CHECKSUM_PREFIX);
    preimage.extend_from_slice(body);
    blake2_512(&preimage)
}
