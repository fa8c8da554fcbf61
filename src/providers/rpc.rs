//! Substrate JSON-RPC client
//!
//! 1. Reads (metadata, storage, block hashes, runtime version, `state_call`) retry with
//!    exponential backoff and jitter
//! 2. `author_submitExtrinsic` is sent exactly once: a broadcast transaction cannot be unsent
//! 3. `connect` probes `system_chain` and returns an error instead of degrading silently
//! 4. User-Agent header and gzip compression on every request

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::metadata::ChainMetadata;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::USER_AGENT as USER_AGENT_CONST;

/// Base retry delay for reads (ms)
pub const RPC_BASE_RETRY_MS: u64 = 500;

/// Retry delay cap (ms)
pub const RPC_MAX_RETRY_MS: u64 = 8000;

/// Attempts per read call
pub const RPC_MAX_ATTEMPTS: u32 = 4;

/// Random jitter applied to each retry delay (percent)
pub const RETRY_JITTER_PERCENT: u64 = 20;

/// `specVersion` / `transactionVersion` of the running runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeVersion {
    pub spec_version: u32,
    pub transaction_version: u32,
}

/// The chain node surface the submitter needs
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Human-readable chain name
    async fn chain_name(&self) -> AppResult<String>;

    /// Runtime metadata, digested for the configured contracts pallet
    async fn metadata(&self) -> AppResult<ChainMetadata>;

    /// Raw storage value at the best block
    async fn storage(&self, key: &[u8]) -> AppResult<Option<Vec<u8>>>;

    /// Hash of block `number`, or of the best block when `None`
    async fn block_hash(&self, number: Option<u64>) -> AppResult<[u8; 32]>;

    async fn finalized_head(&self) -> AppResult<[u8; 32]>;

    /// Block number of a header
    async fn header_number(&self, hash: &[u8; 32]) -> AppResult<u64>;

    async fn runtime_version(&self) -> AppResult<RuntimeVersion>;

    /// Runtime API call (`state_call`)
    async fn state_call(&self, method: &str, data: &[u8]) -> AppResult<Vec<u8>>;

    /// Broadcast a signed extrinsic; returns its hash
    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> AppResult<String>;
}

/// JSON-RPC over HTTP to one Substrate node
pub struct SubstrateRpc {
    url: String,
    client: reqwest::Client,
    contracts_pallet: String,
    request_id: AtomicU64,
}

impl SubstrateRpc {
    /// Build the client and probe the node
    pub async fn connect(url: &str, contracts_pallet: &str, timeout: Duration) -> AppResult<Self> {
        let rpc = Self {
            url: url.to_string(),
            client: Self::build_client(timeout)?,
            contracts_pallet: contracts_pallet.to_string(),
            request_id: AtomicU64::new(1),
        };

        let chain = rpc.chain_name().await.map_err(|e| {
            AppError::new(
                ErrorCode::ChainConnectionFailed,
                format!("Chain node {} unreachable: {}", rpc.masked_url(), e.message),
            )
        })?;
        info!("✅ Connected to chain {} ({})", chain, rpc.masked_url());
        Ok(rpc)
    }

    fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::ChainConnectionFailed, "Failed to build HTTP client", e))
    }

    /// Node URL with any path credentials masked
    pub fn masked_url(&self) -> String {
        match self.url.find("://") {
            Some(scheme_end) => {
                let rest = &self.url[scheme_end + 3..];
                match rest.find('/') {
                    Some(path_start) if path_start + 1 < rest.len() => {
                        format!("{}{}/***HIDDEN***", &self.url[..scheme_end + 3], &rest[..path_start])
                    }
                    _ => self.url.clone(),
                }
            }
            None => self.url.clone(),
        }
    }

    /// Read call with retry
    async fn call<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> AppResult<T> {
        let mut last_error = None;

        for attempt in 0..RPC_MAX_ATTEMPTS {
            if attempt > 0 {
                let base_delay = RPC_BASE_RETRY_MS * 2_u64.pow(attempt - 1);
                let capped_delay = base_delay.min(RPC_MAX_RETRY_MS);

                let jitter_range = (capped_delay * RETRY_JITTER_PERCENT) / 100;
                let jitter: i64 = rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
                let final_delay = (capped_delay as i64 + jitter).max(100) as u64;

                debug!("⏳ {} retry {}/{} after {}ms", method, attempt + 1, RPC_MAX_ATTEMPTS, final_delay);
                tokio::time::sleep(Duration::from_millis(final_delay)).await;
            }

            match self.execute_call::<T>(method, &params).await {
                Ok(result) => return Ok(result),
                // the node answered; asking again gives the same answer
                Err(e) if e.code == ErrorCode::ChainRpc => return Err(e),
                Err(e) => {
                    warn!("⚠️ {} failed (attempt {}/{}): {}", method, attempt + 1, RPC_MAX_ATTEMPTS, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::chain_rpc(format!("{} failed", method))))
    }

    async fn execute_call<T: DeserializeOwned>(&self, method: &str, params: &serde_json::Value) -> AppResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::new(ErrorCode::ChainConnectionFailed, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::new(
                ErrorCode::ChainConnectionFailed,
                format!("HTTP error: {}", status),
            ));
        }

        let json: RpcResponse<T> = response.json().await.map_err(|e| {
            AppError::new(ErrorCode::ChainConnectionFailed, format!("Failed to parse response: {}", e))
        })?;

        if let Some(error) = json.error {
            return Err(AppError::chain_rpc(format!(
                "RPC error: {} (code: {})",
                error.message, error.code
            )));
        }

        json.result
            .ok_or_else(|| AppError::chain_rpc(format!("No result in {} response", method)))
    }
}

#[async_trait]
impl ChainRpc for SubstrateRpc {
    async fn chain_name(&self) -> AppResult<String> {
        self.call("system_chain", serde_json::json!([])).await
    }

    async fn metadata(&self) -> AppResult<ChainMetadata> {
        let raw: String = self.call("state_getMetadata", serde_json::json!([])).await?;
        ChainMetadata::decode(&decode_hex(&raw)?, &self.contracts_pallet)
    }

    async fn storage(&self, key: &[u8]) -> AppResult<Option<Vec<u8>>> {
        let params = serde_json::json!([format!("0x{}", hex::encode(key))]);
        let raw: Option<String> = self.call_nullable("state_getStorage", params).await?;
        raw.map(|v| decode_hex(&v)).transpose()
    }

    async fn block_hash(&self, number: Option<u64>) -> AppResult<[u8; 32]> {
        let params = match number {
            Some(n) => serde_json::json!([n]),
            None => serde_json::json!([]),
        };
        let raw: String = self.call("chain_getBlockHash", params).await?;
        decode_hash(&raw)
    }

    async fn finalized_head(&self) -> AppResult<[u8; 32]> {
        let raw: String = self.call("chain_getFinalizedHead", serde_json::json!([])).await?;
        decode_hash(&raw)
    }

    async fn header_number(&self, hash: &[u8; 32]) -> AppResult<u64> {
        let params = serde_json::json!([format!("0x{}", hex::encode(hash))]);
        let header: Header = self.call("chain_getHeader", params).await?;
        u64::from_str_radix(header.number.trim_start_matches("0x"), 16)
            .map_err(|_| AppError::chain_rpc(format!("Invalid block number {}", header.number)))
    }

    async fn runtime_version(&self) -> AppResult<RuntimeVersion> {
        self.call("state_getRuntimeVersion", serde_json::json!([])).await
    }

    async fn state_call(&self, method: &str, data: &[u8]) -> AppResult<Vec<u8>> {
        let params = serde_json::json!([method, format!("0x{}", hex::encode(data))]);
        let raw: String = self.call("state_call", params).await?;
        decode_hex(&raw)
    }

    async fn submit_extrinsic(&self, extrinsic: &[u8]) -> AppResult<String> {
        let params = serde_json::json!([format!("0x{}", hex::encode(extrinsic))]);
        self.execute_call("author_submitExtrinsic", &params).await
    }
}

impl SubstrateRpc {
    /// `state_getStorage` answers `null` for absent keys
    async fn call_nullable<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> AppResult<Option<T>> {
        match self.call::<T>(method, params).await {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.code == ErrorCode::ChainRpc && e.message.starts_with("No result") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    number: String,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

fn decode_hex(raw: &str) -> AppResult<Vec<u8>> {
    Ok(hex::decode(raw.trim_start_matches("0x"))?)
}

fn decode_hash(raw: &str) -> AppResult<[u8; 32]> {
    let bytes = decode_hex(raw)?;
    bytes
        .try_into()
        .map_err(|_| AppError::chain_rpc(format!("Expected 32-byte hash, got {}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hash() {
        let hash = decode_hash(&format!("0x{}", "ab".repeat(32))).unwrap();
        assert_eq!(hash, [0xab; 32]);
        assert!(decode_hash("0x1234").is_err());
        assert!(decode_hash("0xzz").is_err());
    }

    #[test]
    fn test_runtime_version_parse() {
        let v: RuntimeVersion = serde_json::from_value(serde_json::json!({
            "specName": "node", "specVersion": 1200, "transactionVersion": 7, "apis": []
        }))
        .unwrap();
        assert_eq!(v, RuntimeVersion { spec_version: 1200, transaction_version: 7 });
    }

    #[test]
    fn test_rpc_error_response() {
        let resp: RpcResponse<String> = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0", "id": 3, "error": {"code": 1010, "message": "Invalid Transaction"}
        }))
        .unwrap();
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, 1010);
    }

    #[test]
    fn test_null_storage_result() {
        let resp: RpcResponse<String> = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0", "id": 3, "result": null
        }))
        .unwrap();
        assert!(resp.result.is_none() && resp.error.is_none());
    }
}
