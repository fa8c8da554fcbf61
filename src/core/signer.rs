//! Operator signing identity (sr25519)

use sp_core::crypto::Pair as _;
use sp_core::sr25519;
use tracing::info;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::address::AddressCodec;

/// The single service keypair used for every on-chain transaction.
///
/// Loaded once at startup from a mnemonic or secret URI; immutable afterwards.
#[derive(Clone)]
pub struct SignerIdentity {
    pair: sr25519::Pair,
    public_key: [u8; 32],
}

impl SignerIdentity {
    /// Build from a BIP-39 mnemonic or secret URI (`//Alice`, `<mnemonic>//hard/soft`)
    pub fn from_uri(uri: &str) -> AppResult<Self> {
        let pair = sr25519::Pair::from_string(uri.trim(), None).map_err(|e| {
            AppError::new(
                ErrorCode::SignerInvalid,
                format!("Cannot derive signer keypair: {:?}", e),
            )
        })?;
        let public_key: [u8; 32] = AsRef::<[u8]>::as_ref(&pair.public())
            .try_into()
            .map_err(|_| AppError::new(ErrorCode::SignerInvalid, "Unexpected public key length"))?;

        Ok(Self { pair, public_key })
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    /// Chain-native address of the signer
    pub fn address(&self, network_id: u16) -> String {
        AddressCodec::encode(&self.public_key, network_id)
            .unwrap_or_else(|_| format!("0x{}", hex::encode(self.public_key)))
    }

    pub fn sign(&self, message: &[u8]) -> AppResult<[u8; 64]> {
        let signature = self.pair.sign(message);
        let bytes: &[u8] = signature.as_ref();
        bytes
            .try_into()
            .map_err(|_| AppError::new(ErrorCode::ChainSigning, "Unexpected signature length"))
    }

    pub fn log_identity(&self, network_id: u16) {
        info!("🔐 Signer loaded: {}", self.address(network_id));
    }
}

impl std::fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerIdentity")
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alice_identity() {
        let signer = SignerIdentity::from_uri("//Alice").unwrap();
        assert_eq!(
            hex::encode(signer.public_key()),
            "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d"
        );
        assert_eq!(signer.address(42), "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY");
    }

    #[test]
    fn test_signature_verifies() {
        let signer = SignerIdentity::from_uri("//Bob").unwrap();
        let sig = signer.sign(b"attendance").unwrap();
        let public = sr25519::Public::from_raw(*signer.public_key());
        let signature = sr25519::Signature::from_raw(sig);
        assert!(sr25519::Pair::verify(&signature, b"attendance", &public));
    }

    #[test]
    fn test_invalid_uri() {
        let err = SignerIdentity::from_uri("definitely not a mnemonic").unwrap_err();
        assert_eq!(err.code, ErrorCode::SignerInvalid);
    }

    #[test]
    fn test_debug_hides_secret() {
        let signer = SignerIdentity::from_uri("//Alice").unwrap();
        assert!(!format!("{:?}", signer).contains("Alice"));
    }
}
