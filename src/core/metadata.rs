//! Runtime metadata digest
//!
//! Only what the extrinsic builder needs is kept: the contracts pallet and `call`
//! indices, the shape of `gas_limit`, and the ordered signed-extension list.
//! V14 and V15 metadata are supported.

use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed};
use parity_scale_codec::Decode;
use scale_info::form::PortableForm;
use scale_info::{PortableRegistry, TypeDef};

use crate::models::errors::{AppError, AppResult, ErrorCode};

/// Name of the contract call dispatchable
const CONTRACT_CALL_NAME: &str = "call";

/// Encoding of the `gas_limit` argument of `Contracts::call`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasLimitShape {
    /// Weight V2: `{ ref_time: Compact<u64>, proof_size: Compact<u64> }`
    Weight,
    /// Pre-V2 runtimes: `Compact<u64>`
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedExtension {
    pub identifier: String,
    /// The extension contributes no bytes to either the extra or the additional data
    pub is_noop: bool,
}

impl SignedExtension {
    pub fn new(identifier: impl Into<String>, is_noop: bool) -> Self {
        Self {
            identifier: identifier.into(),
            is_noop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainMetadata {
    pub pallet_name: String,
    pub pallet_index: u8,
    pub call_index: u8,
    pub gas_limit: GasLimitShape,
    pub signed_extensions: Vec<SignedExtension>,
}

impl ChainMetadata {
    /// Digest for a stock Substrate runtime with the contracts pallet at the given indices
    pub fn standard(pallet_index: u8, call_index: u8) -> Self {
        let ext = |id: &str, noop: bool| SignedExtension::new(id, noop);
        Self {
            pallet_name: "Contracts".to_string(),
            pallet_index,
            call_index,
            gas_limit: GasLimitShape::Weight,
            signed_extensions: vec![
                ext("CheckNonZeroSender", true),
                ext("CheckSpecVersion", false),
                ext("CheckTxVersion", false),
                ext("CheckGenesis", false),
                ext("CheckMortality", false),
                ext("CheckNonce", false),
                ext("CheckWeight", true),
                ext("ChargeTransactionPayment", false),
            ],
        }
    }

    /// Decode SCALE-encoded `RuntimeMetadataPrefixed` and digest it
    pub fn decode(bytes: &[u8], pallet_name: &str) -> AppResult<Self> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &bytes[..]).map_err(|e| {
            AppError::with_source(ErrorCode::ChainMetadataFetch, "Runtime metadata decode failed", e)
        })?;

        match prefixed.1 {
            RuntimeMetadata::V14(m) => {
                let pallet = m
                    .pallets
                    .iter()
                    .find(|p| p.name == pallet_name)
                    .ok_or_else(|| missing_pallet(pallet_name))?;
                let calls_ty = pallet.calls.as_ref().map(|c| c.ty.id);
                let extensions = m
                    .extrinsic
                    .signed_extensions
                    .iter()
                    .map(|e| (e.identifier.as_str(), e.ty.id, e.additional_signed.id));
                digest(&m.types, pallet_name, pallet.index, calls_ty, extensions)
            }
            RuntimeMetadata::V15(m) => {
                let pallet = m
                    .pallets
                    .iter()
                    .find(|p| p.name == pallet_name)
                    .ok_or_else(|| missing_pallet(pallet_name))?;
                let calls_ty = pallet.calls.as_ref().map(|c| c.ty.id);
                let extensions = m
                    .extrinsic
                    .signed_extensions
                    .iter()
                    .map(|e| (e.identifier.as_str(), e.ty.id, e.additional_signed.id));
                digest(&m.types, pallet_name, pallet.index, calls_ty, extensions)
            }
            other => Err(AppError::new(
                ErrorCode::ChainMetadataFetch,
                format!("Unsupported runtime metadata version {}", other.version()),
            )),
        }
    }
}

fn missing_pallet(name: &str) -> AppError {
    AppError::new(
        ErrorCode::ChainMetadataFetch,
        format!("Pallet {} not found in runtime metadata", name),
    )
}

fn digest<'a>(
    registry: &PortableRegistry,
    pallet_name: &str,
    pallet_index: u8,
    calls_ty: Option<u32>,
    extensions: impl Iterator<Item = (&'a str, u32, u32)>,
) -> AppResult<ChainMetadata> {
    let calls_ty = calls_ty.ok_or_else(|| {
        AppError::new(
            ErrorCode::ChainMetadataFetch,
            format!("Pallet {} exposes no calls", pallet_name),
        )
    })?;

    let variants = match registry.resolve(calls_ty).map(|t| &t.type_def) {
        Some(TypeDef::Variant(v)) => &v.variants,
        _ => {
            return Err(AppError::new(
                ErrorCode::ChainMetadataFetch,
                "Pallet call type is not an enum",
            ))
        }
    };

    let call = variants
        .iter()
        .find(|v| v.name == CONTRACT_CALL_NAME)
        .ok_or_else(|| {
            AppError::new(
                ErrorCode::ChainMetadataFetch,
                format!("{}::{} not found", pallet_name, CONTRACT_CALL_NAME),
            )
        })?;

    let gas_limit = call
        .fields
        .iter()
        .find(|f| f.name.as_deref() == Some("gas_limit"))
        .map(|f| gas_limit_shape(registry, f.ty.id))
        .ok_or_else(|| AppError::new(ErrorCode::ChainMetadataFetch, "gas_limit argument not found"))??;

    let signed_extensions = extensions
        .map(|(identifier, extra, additional)| {
            SignedExtension::new(
                identifier,
                is_empty_type(registry, extra, 0) && is_empty_type(registry, additional, 0),
            )
        })
        .collect();

    Ok(ChainMetadata {
        pallet_name: pallet_name.to_string(),
        pallet_index,
        call_index: call.index,
        gas_limit,
        signed_extensions,
    })
}

fn gas_limit_shape(registry: &PortableRegistry, id: u32) -> AppResult<GasLimitShape> {
    match registry.resolve(id).map(|t| &t.type_def) {
        Some(TypeDef::Composite(c)) if has_field(&c.fields, "ref_time") => Ok(GasLimitShape::Weight),
        Some(TypeDef::Compact(_)) | Some(TypeDef::Primitive(_)) => Ok(GasLimitShape::Legacy),
        _ => Err(AppError::new(
            ErrorCode::ChainMetadataFetch,
            "Unrecognized gas_limit type",
        )),
    }
}

fn has_field(fields: &[scale_info::Field<PortableForm>], name: &str) -> bool {
    fields.iter().any(|f| f.name.as_deref() == Some(name))
}

/// Zero-sized: unit tuple, field-less composite, or composites/tuples of those
fn is_empty_type(registry: &PortableRegistry, id: u32, depth: u8) -> bool {
    if depth > 8 {
        return false;
    }
    match registry.resolve(id).map(|t| &t.type_def) {
        Some(TypeDef::Tuple(t)) => t.fields.iter().all(|f| is_empty_type(registry, f.id, depth + 1)),
        Some(TypeDef::Composite(c)) => c
            .fields
            .iter()
            .all(|f| is_empty_type(registry, f.ty.id, depth + 1)),
        Some(TypeDef::Array(a)) => a.len == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_metadata::v14::{
        ExtrinsicMetadata, PalletCallMetadata, PalletMetadata, RuntimeMetadataV14,
        SignedExtensionMetadata,
    };
    use parity_scale_codec::{Compact, Encode};
    use scale_info::{meta_type, TypeInfo};

    #[allow(dead_code)]
    #[derive(TypeInfo)]
    struct WeightV2 {
        #[codec(compact)]
        ref_time: u64,
        #[codec(compact)]
        proof_size: u64,
    }

    #[allow(dead_code, non_camel_case_types)]
    #[derive(TypeInfo)]
    enum ContractsCall {
        #[codec(index = 0)]
        call_old_weight { gas_limit: Compact<u64> },
        #[codec(index = 6)]
        call {
            dest: [u8; 32],
            value: Compact<u128>,
            gas_limit: WeightV2,
            storage_deposit_limit: Option<Compact<u128>>,
            data: Vec<u8>,
        },
    }

    #[allow(dead_code)]
    #[derive(TypeInfo)]
    struct CheckNonZeroSender;

    fn metadata_bytes() -> Vec<u8> {
        let pallet = PalletMetadata {
            name: "Contracts",
            storage: None,
            calls: Some(PalletCallMetadata { ty: meta_type::<ContractsCall>() }),
            event: None,
            constants: vec![],
            error: None,
            index: 8,
        };
        let extrinsic = ExtrinsicMetadata {
            ty: meta_type::<()>(),
            version: 4,
            signed_extensions: vec![
                SignedExtensionMetadata {
                    identifier: "CheckNonZeroSender",
                    ty: meta_type::<CheckNonZeroSender>(),
                    additional_signed: meta_type::<()>(),
                },
                SignedExtensionMetadata {
                    identifier: "CheckNonce",
                    ty: meta_type::<Compact<u32>>(),
                    additional_signed: meta_type::<()>(),
                },
            ],
        };
        let v14 = RuntimeMetadataV14::new(vec![pallet], extrinsic, meta_type::<()>());
        RuntimeMetadataPrefixed::from(v14).encode()
    }

    #[test]
    fn test_decode_v14_digest() {
        let metadata = ChainMetadata::decode(&metadata_bytes(), "Contracts").unwrap();
        assert_eq!(metadata.pallet_index, 8);
        assert_eq!(metadata.call_index, 6);
        assert_eq!(metadata.gas_limit, GasLimitShape::Weight);
        assert_eq!(
            metadata.signed_extensions,
            vec![
                SignedExtension::new("CheckNonZeroSender", true),
                SignedExtension::new("CheckNonce", false),
            ]
        );
    }

    #[test]
    fn test_missing_pallet() {
        let err = ChainMetadata::decode(&metadata_bytes(), "Revive").unwrap_err();
        assert_eq!(err.code, ErrorCode::ChainMetadataFetch);
        assert!(err.message.contains("Revive"));
    }

    #[test]
    fn test_garbage_metadata() {
        let err = ChainMetadata::decode(&[1, 2, 3], "Contracts").unwrap_err();
        assert_eq!(err.code, ErrorCode::ChainMetadataFetch);
    }
}
