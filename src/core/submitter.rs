//! Transaction submission pipeline
//!
//! One submission: metadata → nonce → call → envelope → sign → broadcast.
//! Each step failure carries its own error code. Submissions are serialized by the
//! nonce lock, so two mints in one process never share a nonce.

use async_trait::async_trait;
use parity_scale_codec::{Decode, Encode};
use sp_crypto_hashing::blake2_256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::core::extrinsic::{
    account_storage_key, build_signed_extrinsic, encode_contract_call, Era, GasLimit, SigningContext,
};
use crate::core::metadata::{ChainMetadata, GasLimitShape};
use crate::core::signer::SignerIdentity;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::providers::rpc::ChainRpc;
use crate::utils::constants::DRY_RUN_GAS_BUFFER_PERCENT;

/// Runtime API used for gas estimation
const DRY_RUN_METHOD: &str = "ContractsApi_call";

/// Submits an encoded contract message to a contract
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Returns the transaction hash as `0x`-prefixed hex
    async fn submit(&self, call_data: &[u8], destination: &[u8; 32]) -> AppResult<String>;
}

/// Chain-specific submission tunables
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub gas_limit: GasLimit,
    pub storage_deposit_limit: Option<u128>,
    /// 0 = immortal
    pub mortal_period: u64,
    pub dry_run: bool,
}

/// Nonce bookkeeping across submissions.
///
/// The chain nonce may lag behind transactions still in the pool, so the next nonce
/// is `max(chain, last confirmed + 1)`. Only accepted submissions are confirmed.
#[derive(Debug, Default)]
pub struct NonceTracker {
    last_used: Option<u32>,
}

impl NonceTracker {
    pub fn next(&self, chain_nonce: u32) -> u32 {
        match self.last_used {
            Some(last) => chain_nonce.max(last.saturating_add(1)),
            None => chain_nonce,
        }
    }

    pub fn confirm(&mut self, nonce: u32) {
        self.last_used = Some(self.last_used.map_or(nonce, |last| last.max(nonce)));
    }

    pub fn last_used(&self) -> Option<u32> {
        self.last_used
    }
}

#[derive(Decode)]
struct DryRunWeight {
    #[codec(compact)]
    ref_time: u64,
    #[codec(compact)]
    proof_size: u64,
}

/// Submitter backed by a real chain node
pub struct SubstrateSubmitter<R: ChainRpc> {
    rpc: Arc<R>,
    signer: Arc<SignerIdentity>,
    config: SubmitterConfig,
    nonce: Mutex<NonceTracker>,
    genesis_hash: OnceCell<[u8; 32]>,
}

impl<R: ChainRpc> SubstrateSubmitter<R> {
    pub fn new(rpc: Arc<R>, signer: Arc<SignerIdentity>, config: SubmitterConfig) -> Self {
        Self {
            rpc,
            signer,
            config,
            nonce: Mutex::new(NonceTracker::default()),
            genesis_hash: OnceCell::new(),
        }
    }

    async fn chain_nonce(&self) -> AppResult<u32> {
        let key = account_storage_key(self.signer.public_key());
        match self.rpc.storage(&key).await? {
            // AccountInfo starts with `nonce: u32`
            Some(info) => Ok(u32::decode(&mut &info[..])?),
            None => Ok(0),
        }
    }

    async fn genesis(&self) -> AppResult<[u8; 32]> {
        self.genesis_hash
            .get_or_try_init(|| self.rpc.block_hash(Some(0)))
            .await
            .copied()
    }

    /// Era plus the hash of its birth block
    async fn era(&self, genesis: [u8; 32]) -> AppResult<(Era, [u8; 32])> {
        if self.config.mortal_period == 0 {
            return Ok((Era::Immortal, genesis));
        }
        let head = self.rpc.finalized_head().await?;
        let number = self.rpc.header_number(&head).await?;
        let era = Era::mortal(self.config.mortal_period, number);
        let birth = era.birth(number);
        let birth_hash = if birth == number {
            head
        } else {
            self.rpc.block_hash(Some(birth)).await?
        };
        Ok((era, birth_hash))
    }

    /// `gas_required` from a dry run, plus buffer
    async fn estimate_gas(&self, metadata: &ChainMetadata, destination: &[u8; 32], call_data: &[u8]) -> AppResult<GasLimit> {
        if metadata.gas_limit == GasLimitShape::Legacy {
            return Err(AppError::construction("Dry run needs Weight V2 gas limits"));
        }

        let mut input = Vec::new();
        self.signer.public_key().encode_to(&mut input);
        destination.encode_to(&mut input);
        0u128.encode_to(&mut input);
        None::<()>.encode_to(&mut input); // gas_limit
        None::<u128>.encode_to(&mut input); // storage_deposit_limit
        call_data.encode_to(&mut input);

        let output = self.rpc.state_call(DRY_RUN_METHOD, &input).await?;
        let mut cursor = &output[..];
        let _consumed = DryRunWeight::decode(&mut cursor)?;
        let required = DryRunWeight::decode(&mut cursor)?;

        Ok(GasLimit {
            ref_time: required.ref_time,
            proof_size: required.proof_size,
        }
        .with_buffer(DRY_RUN_GAS_BUFFER_PERCENT))
    }

    async fn gas_limit(&self, metadata: &ChainMetadata, destination: &[u8; 32], call_data: &[u8]) -> GasLimit {
        if !self.config.dry_run {
            return self.config.gas_limit;
        }
        match self.estimate_gas(metadata, destination, call_data).await {
            Ok(gas) => {
                debug!("⛽ Dry-run gas: ref_time={} proof_size={}", gas.ref_time, gas.proof_size);
                gas
            }
            Err(e) => {
                warn!("⚠️ Gas estimation failed, using configured limits: {}", e);
                self.config.gas_limit
            }
        }
    }
}

#[async_trait]
impl<R: ChainRpc> TransactionSubmitter for SubstrateSubmitter<R> {
    async fn submit(&self, call_data: &[u8], destination: &[u8; 32]) -> AppResult<String> {
        let mut tracker = self.nonce.lock().await;

        let metadata = self
            .rpc
            .metadata()
            .await
            .map_err(|e| e.at_step(ErrorCode::ChainMetadataFetch))?;

        let chain_nonce = self
            .chain_nonce()
            .await
            .map_err(|e| e.at_step(ErrorCode::ChainNonceFetch))?;
        let nonce = tracker.next(chain_nonce);

        let gas_limit = self.gas_limit(&metadata, destination, call_data).await;
        let call = encode_contract_call(
            &metadata,
            destination,
            &gas_limit,
            self.config.storage_deposit_limit,
            call_data,
        );

        let genesis_hash = self
            .genesis()
            .await
            .map_err(|e| e.at_step(ErrorCode::ChainBlockHashFetch))?;
        let (era, era_block_hash) = self
            .era(genesis_hash)
            .await
            .map_err(|e| e.at_step(ErrorCode::ChainBlockHashFetch))?;
        let version = self
            .rpc
            .runtime_version()
            .await
            .map_err(|e| e.at_step(ErrorCode::ChainRuntimeVersionFetch))?;

        let ctx = SigningContext {
            spec_version: version.spec_version,
            transaction_version: version.transaction_version,
            genesis_hash,
            era,
            era_block_hash,
            nonce,
            tip: 0,
        };
        let extrinsic = build_signed_extrinsic(&metadata, &ctx, &call, &self.signer)?;

        info!(
            "📤 Submitting contract call (nonce {}, {} bytes, gas ref_time {})",
            nonce,
            extrinsic.len(),
            gas_limit.ref_time
        );
        let hash = self
            .rpc
            .submit_extrinsic(&extrinsic)
            .await
            .map_err(|e| e.at_step(ErrorCode::ChainSubmission))?;

        tracker.confirm(nonce);
        info!("✅ Extrinsic accepted: {}", hash);
        Ok(hash)
    }
}

/// Sandbox submitter: deterministic fake hashes, nothing leaves the process.
///
/// Only constructed when sandbox mode is configured explicitly.
#[derive(Debug, Default)]
pub struct SimulatedSubmitter {
    submitted: AtomicU64,
}

impl SimulatedSubmitter {
    pub fn new() -> Self {
        warn!("🧪 Sandbox mode: transactions are simulated and never broadcast");
        Self::default()
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransactionSubmitter for SimulatedSubmitter {
    async fn submit(&self, call_data: &[u8], destination: &[u8; 32]) -> AppResult<String> {
        let seq = self.submitted.fetch_add(1, Ordering::Relaxed);
        let mut preimage = Vec::with_capacity(call_data.len() + 40);
        preimage.extend_from_slice(destination);
        preimage.extend_from_slice(call_data);
        preimage.extend_from_slice(&seq.to_le_bytes());
        let hash = format!("0x{}", hex::encode(blake2_256(&preimage)));
        info!("🧪 Simulated submission #{}: {}", seq + 1, hash);
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::rpc::RuntimeVersion;
    use std::sync::Mutex as StdMutex;

    /// Scripted node: fixed nonce, optional failure points, records submissions
    #[derive(Default)]
    struct FakeRpc {
        chain_nonce: u32,
        fail_metadata: bool,
        fail_submit: StdMutex<bool>,
        dry_run_output: Option<Vec<u8>>,
        submitted: StdMutex<Vec<Vec<u8>>>,
        state_calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ChainRpc for FakeRpc {
        async fn chain_name(&self) -> AppResult<String> {
            Ok("Development".into())
        }
        async fn metadata(&self) -> AppResult<ChainMetadata> {
            if self.fail_metadata {
                return Err(AppError::chain_rpc("metadata unavailable"));
            }
            Ok(ChainMetadata::standard(8, 6))
        }
        async fn storage(&self, _key: &[u8]) -> AppResult<Option<Vec<u8>>> {
            let mut info = self.chain_nonce.encode();
            info.extend([0u8; 12]);
            Ok(Some(info))
        }
        async fn block_hash(&self, number: Option<u64>) -> AppResult<[u8; 32]> {
            Ok([number.unwrap_or(255) as u8; 32])
        }
        async fn finalized_head(&self) -> AppResult<[u8; 32]> {
            Ok([0xee; 32])
        }
        async fn header_number(&self, _hash: &[u8; 32]) -> AppResult<u64> {
            Ok(1000)
        }
        async fn runtime_version(&self) -> AppResult<RuntimeVersion> {
            Ok(RuntimeVersion { spec_version: 100, transaction_version: 1 })
        }
        async fn state_call(&self, method: &str, _data: &[u8]) -> AppResult<Vec<u8>> {
            self.state_calls.lock().unwrap().push(method.to_string());
            self.dry_run_output
                .clone()
                .ok_or_else(|| AppError::chain_rpc("dry run unsupported"))
        }
        async fn submit_extrinsic(&self, extrinsic: &[u8]) -> AppResult<String> {
            if *self.fail_submit.lock().unwrap() {
                return Err(AppError::chain_rpc("RPC error: Invalid Transaction (code: 1010)"));
            }
            self.submitted.lock().unwrap().push(extrinsic.to_vec());
            Ok(crate::core::extrinsic::extrinsic_hash(extrinsic))
        }
    }

    fn config(mortal_period: u64, dry_run: bool) -> SubmitterConfig {
        SubmitterConfig {
            gas_limit: GasLimit { ref_time: 1_000, proof_size: 100 },
            storage_deposit_limit: None,
            mortal_period,
            dry_run,
        }
    }

    fn submitter(rpc: Arc<FakeRpc>, mortal_period: u64, dry_run: bool) -> SubstrateSubmitter<FakeRpc> {
        let signer = Arc::new(SignerIdentity::from_uri("//Alice").unwrap());
        SubstrateSubmitter::new(rpc, signer, config(mortal_period, dry_run))
    }

    /// Compact nonce right after the immortal era byte
    fn nonce_of(extrinsic: &[u8]) -> u32 {
        let body = Vec::<u8>::decode(&mut &extrinsic[..]).unwrap();
        assert_eq!(body[99], 0x00);
        parity_scale_codec::Compact::<u32>::decode(&mut &body[100..]).unwrap().0
    }

    #[tokio::test]
    async fn test_sequential_submissions_use_distinct_nonces() {
        let rpc = Arc::new(FakeRpc { chain_nonce: 7, ..Default::default() });
        let submitter = submitter(rpc.clone(), 0, false);

        let first = submitter.submit(&[1, 2, 3], &[9u8; 32]).await.unwrap();
        let second = submitter.submit(&[1, 2, 3], &[9u8; 32]).await.unwrap();
        assert_ne!(first, second);

        let submitted = rpc.submitted.lock().unwrap().clone();
        assert_eq!(nonce_of(&submitted[0]), 7);
        assert_eq!(nonce_of(&submitted[1]), 8);
    }

    #[tokio::test]
    async fn test_failed_submission_does_not_consume_nonce() {
        let rpc = Arc::new(FakeRpc { chain_nonce: 3, ..Default::default() });
        let submitter = submitter(rpc.clone(), 0, false);

        *rpc.fail_submit.lock().unwrap() = true;
        let err = submitter.submit(&[1], &[9u8; 32]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ChainSubmission);
        assert!(err.message.contains("Invalid Transaction"));

        *rpc.fail_submit.lock().unwrap() = false;
        submitter.submit(&[1], &[9u8; 32]).await.unwrap();
        let submitted = rpc.submitted.lock().unwrap().clone();
        assert_eq!(nonce_of(&submitted[0]), 3);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_reported_by_step() {
        let rpc = Arc::new(FakeRpc { fail_metadata: true, ..Default::default() });
        let err = submitter(rpc.clone(), 0, false).submit(&[1], &[9u8; 32]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ChainMetadataFetch);
        assert!(rpc.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mortal_era_is_attached() {
        let rpc = Arc::new(FakeRpc::default());
        submitter(rpc.clone(), 64, false).submit(&[1], &[9u8; 32]).await.unwrap();
        let xt = rpc.submitted.lock().unwrap()[0].clone();
        let body = Vec::<u8>::decode(&mut &xt[..]).unwrap();
        assert_eq!(&body[99..101], &[0x85, 0x02]);
    }

    #[tokio::test]
    async fn test_dry_run_falls_back_to_configured_gas() {
        let rpc = Arc::new(FakeRpc::default());
        let submitter = submitter(rpc.clone(), 0, true);
        let metadata = ChainMetadata::standard(8, 6);
        let gas = submitter.gas_limit(&metadata, &[9u8; 32], &[1]).await;
        assert_eq!(gas, GasLimit { ref_time: 1_000, proof_size: 100 });
        assert_eq!(rpc.state_calls.lock().unwrap().as_slice(), &["ContractsApi_call".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_adds_buffer() {
        let mut output = Vec::new();
        parity_scale_codec::Compact(500u64).encode_to(&mut output);
        parity_scale_codec::Compact(50u64).encode_to(&mut output);
        parity_scale_codec::Compact(5_000u64).encode_to(&mut output);
        parity_scale_codec::Compact(100u64).encode_to(&mut output);
        let rpc = Arc::new(FakeRpc { dry_run_output: Some(output), ..Default::default() });

        let gas = submitter(rpc, 0, true)
            .gas_limit(&ChainMetadata::standard(8, 6), &[9u8; 32], &[1])
            .await;
        assert_eq!(gas, GasLimit { ref_time: 6_000, proof_size: 120 });
    }

    #[test]
    fn test_nonce_tracker() {
        let mut tracker = NonceTracker::default();
        assert_eq!(tracker.next(4), 4);
        tracker.confirm(4);
        assert_eq!(tracker.next(4), 5);
        assert_eq!(tracker.next(9), 9);
        tracker.confirm(9);
        tracker.confirm(6);
        assert_eq!(tracker.last_used(), Some(9));
    }

    #[tokio::test]
    async fn test_simulated_submitter_is_deterministic_per_sequence() {
        let a = SimulatedSubmitter::default();
        let b = SimulatedSubmitter::default();
        let h1 = a.submit(&[1], &[2u8; 32]).await.unwrap();
        assert_eq!(h1, b.submit(&[1], &[2u8; 32]).await.unwrap());
        assert_ne!(h1, a.submit(&[1], &[2u8; 32]).await.unwrap());
        assert_eq!(a.submitted(), 2);
    }
}
