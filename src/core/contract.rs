//! Deployed contract handle, resolved once at startup and shared read-only.

use tracing::{info, warn};

use crate::core::encoder::CallEncoder;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::address::{AddressCodec, DecodeStrategy};

#[derive(Debug, Clone)]
pub struct ContractContext {
    address: String,
    account_id: [u8; 32],
    encoder: CallEncoder,
}

impl ContractContext {
    /// Decode the contract address; a hashed pseudo-identifier is refused
    pub fn resolve(address: &str, encoder: CallEncoder) -> AppResult<Self> {
        let decoded = AddressCodec::decode(address);
        match decoded.strategy {
            DecodeStrategy::HashFallback => {
                return Err(AppError::new(
                    ErrorCode::AddressNotAnAccount,
                    format!("Contract address {:?} cannot be decoded", address),
                ))
            }
            DecodeStrategy::Lenient => {
                warn!("⚠️ Contract address checksum is invalid; using extracted key")
            }
            DecodeStrategy::Strict | DecodeStrategy::Hex => {}
        }

        info!("📜 Contract resolved: {}", address);
        Ok(Self {
            address: address.trim().to_string(),
            account_id: decoded.public_key,
            encoder,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn account_id(&self) -> &[u8; 32] {
        &self.account_id
    }

    pub fn encoder(&self) -> &CallEncoder {
        &self.encoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_valid_address() {
        let ctx = ContractContext::resolve(
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY",
            CallEncoder::default(),
        )
        .unwrap();
        assert_eq!(ctx.account_id()[0], 0xd4);
    }

    #[test]
    fn test_resolve_rejects_garbage() {
        let err = ContractContext::resolve("contract", CallEncoder::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AddressNotAnAccount);
    }
}
