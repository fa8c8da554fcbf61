//! Signed extrinsic construction (format v4)
//!
//! ```text
//! compact(len) ++ 0x84 ++ 0x00 ++ signer(32) ++ 0x01 ++ sr25519 sig(64) ++ extra ++ call
//! ```
//!
//! The signed payload is `call ++ extra ++ additional`, hashed with blake2_256 first
//! when it exceeds 256 bytes.

use parity_scale_codec::{Compact, Encode};
use sp_crypto_hashing::{blake2_128, blake2_256, twox_128};

use crate::core::metadata::{ChainMetadata, GasLimitShape};
use crate::core::signer::SignerIdentity;
use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::{MAX_UNHASHED_PAYLOAD_LEN, SIGNED_EXTRINSIC_V4};

const MULTI_ADDRESS_ID: u8 = 0x00;
const MULTI_SIGNATURE_SR25519: u8 = 0x01;

/// Transaction mortality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    Immortal,
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Mortal era starting at `current_block`; period is rounded up to a power of two in 4..=65536
    pub fn mortal(period: u64, current_block: u64) -> Self {
        let period = period.checked_next_power_of_two().unwrap_or(1 << 16).clamp(4, 1 << 16);
        let phase = current_block % period;
        let quantize_factor = (period >> 12).max(1);
        let quantized_phase = phase / quantize_factor * quantize_factor;
        Era::Mortal {
            period,
            phase: quantized_phase,
        }
    }

    pub fn encode_era(&self) -> Vec<u8> {
        match self {
            Era::Immortal => vec![0],
            Era::Mortal { period, phase } => {
                let quantize_factor = (*period >> 12).max(1);
                let low = (period.trailing_zeros().saturating_sub(1)).clamp(1, 15) as u16;
                let high = ((*phase / quantize_factor) << 4) as u16;
                (low | high).to_le_bytes().to_vec()
            }
        }
    }

    /// First block of the validity window containing `current_block`
    pub fn birth(&self, current_block: u64) -> u64 {
        match self {
            Era::Immortal => 0,
            Era::Mortal { period, phase } => {
                (current_block.max(*phase) - phase) / period * period + phase
            }
        }
    }
}

/// Weight limit handed to `Contracts::call`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimit {
    pub ref_time: u64,
    pub proof_size: u64,
}

impl GasLimit {
    pub fn encode_as(&self, shape: GasLimitShape, out: &mut Vec<u8>) {
        match shape {
            GasLimitShape::Weight => {
                Compact(self.ref_time).encode_to(out);
                Compact(self.proof_size).encode_to(out);
            }
            GasLimitShape::Legacy => Compact(self.ref_time).encode_to(out),
        }
    }

    /// Add a percentage on top of both components
    pub fn with_buffer(&self, percent: u64) -> Self {
        let bump = |v: u64| v.saturating_add(v.saturating_mul(percent) / 100);
        Self {
            ref_time: bump(self.ref_time),
            proof_size: bump(self.proof_size),
        }
    }
}

/// Everything the envelope needs besides the call
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: [u8; 32],
    pub era: Era,
    /// Hash of the era's birth block (genesis for immortal)
    pub era_block_hash: [u8; 32],
    pub nonce: u32,
    pub tip: u128,
}

/// `Contracts::call { dest, value: 0, gas_limit, storage_deposit_limit, data }`
pub fn encode_contract_call(
    metadata: &ChainMetadata,
    dest: &[u8; 32],
    gas_limit: &GasLimit,
    storage_deposit_limit: Option<u128>,
    data: &[u8],
) -> Vec<u8> {
    let mut call = Vec::with_capacity(2 + 33 + 1 + 16 + 17 + data.len() + 5);
    call.push(metadata.pallet_index);
    call.push(metadata.call_index);
    call.push(MULTI_ADDRESS_ID);
    call.extend_from_slice(dest);
    Compact(0u128).encode_to(&mut call);
    gas_limit.encode_as(metadata.gas_limit, &mut call);
    storage_deposit_limit.map(Compact).encode_to(&mut call);
    data.encode_to(&mut call);
    call
}

/// Extra (signed with and included in the extrinsic) and additional (signed only) bytes
pub fn encode_extensions(metadata: &ChainMetadata, ctx: &SigningContext) -> AppResult<(Vec<u8>, Vec<u8>)> {
    let mut extra = Vec::new();
    let mut additional = Vec::new();

    for ext in &metadata.signed_extensions {
        match ext.identifier.as_str() {
            "CheckSpecVersion" => ctx.spec_version.encode_to(&mut additional),
            "CheckTxVersion" => ctx.transaction_version.encode_to(&mut additional),
            "CheckGenesis" => additional.extend_from_slice(&ctx.genesis_hash),
            "CheckMortality" | "CheckEra" => {
                extra.extend(ctx.era.encode_era());
                additional.extend_from_slice(&ctx.era_block_hash);
            }
            "CheckNonce" => Compact(ctx.nonce).encode_to(&mut extra),
            "ChargeTransactionPayment" => Compact(ctx.tip).encode_to(&mut extra),
            "ChargeAssetTxPayment" => {
                Compact(ctx.tip).encode_to(&mut extra);
                extra.push(0); // no asset id
            }
            "CheckMetadataHash" => {
                extra.push(0); // mode: disabled
                additional.push(0); // no metadata hash
            }
            _ if ext.is_noop => {}
            other => {
                return Err(AppError::construction(format!(
                    "Unsupported signed extension {}",
                    other
                )))
            }
        }
    }

    Ok((extra, additional))
}

/// Build, sign and length-prefix an extrinsic
pub fn build_signed_extrinsic(
    metadata: &ChainMetadata,
    ctx: &SigningContext,
    call: &[u8],
    signer: &SignerIdentity,
) -> AppResult<Vec<u8>> {
    let (extra, additional) = encode_extensions(metadata, ctx)?;

    let mut payload = Vec::with_capacity(call.len() + extra.len() + additional.len());
    payload.extend_from_slice(call);
    payload.extend_from_slice(&extra);
    payload.extend_from_slice(&additional);

    let signature = if payload.len() > MAX_UNHASHED_PAYLOAD_LEN {
        signer.sign(&blake2_256(&payload))?
    } else {
        signer.sign(&payload)?
    };

    let mut body = Vec::with_capacity(1 + 33 + 65 + extra.len() + call.len());
    body.push(SIGNED_EXTRINSIC_V4);
    body.push(MULTI_ADDRESS_ID);
    body.extend_from_slice(signer.public_key());
    body.push(MULTI_SIGNATURE_SR25519);
    body.extend_from_slice(&signature);
    body.extend_from_slice(&extra);
    body.extend_from_slice(call);

    Ok(body.encode())
}

/// `System.Account` storage key for an account id
pub fn account_storage_key(public_key: &[u8; 32]) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + 16 + 16 + 32);
    key.extend_from_slice(&twox_128(b"System"));
    key.extend_from_slice(&twox_128(b"Account"));
    key.extend_from_slice(&blake2_128(public_key));
    key.extend_from_slice(public_key);
    key
}

/// Extrinsic hash as returned by `author_submitExtrinsic`
pub fn extrinsic_hash(extrinsic: &[u8]) -> String {
    format!("0x{}", hex::encode(blake2_256(extrinsic)))
}
