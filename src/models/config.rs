//! Configuration module
//!
//! Every value comes from the environment with a documented default; defaults live in
//! utils/constants.rs. Secrets are never logged.

use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::OperatorCredential;
use crate::utils::constants::{
    mask_secret, CREATE_EVENT_SELECTOR, DEFAULT_CHECKIN_OFFSET_SECS, DEFAULT_CHECKIN_OPERATOR_DELAY_MS,
    DEFAULT_CONTRACTS_PALLET, DEFAULT_EVENT_DELAY_MS, DEFAULT_GAS_PROOF_SIZE, DEFAULT_GAS_REF_TIME,
    DEFAULT_MAX_RETRIES, DEFAULT_MORTAL_PERIOD, DEFAULT_PROVIDER_TIMEOUT_SECS, DEFAULT_REQUEST_INTERVAL_MS,
    DEFAULT_RPC_TIMEOUT_SECS, DEFAULT_SS58_PREFIX, DEFAULT_SYNC_INTERVAL_SECS, DEFAULT_SYNC_OPERATOR_DELAY_MS,
    DEV_SIGNER_URI, LUMA_BASE_URL, MINT_NFT_SELECTOR, STARTUP_CHECKIN_DELAY_SECS,
};

/// Events provider settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_interval: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
}

/// Chain and contract settings
#[derive(Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub rpc_timeout: Duration,
    pub contract_address: String,
    pub ss58_prefix: u16,
    pub contracts_pallet: String,
    pub gas_ref_time: u64,
    pub gas_proof_size: u64,
    pub storage_deposit_limit: Option<u128>,
    /// 0 = immortal era
    pub mortal_period: u64,
    pub dry_run: bool,
    /// Use the simulated submitter instead of a node
    pub sandbox: bool,
    pub mint_selector: [u8; 4],
    pub create_event_selector: [u8; 4],
    pub signer_uri: String,
}

// Signer URI and RPC credentials stay out of debug output.
impl std::fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &mask_secret(&self.rpc_url))
            .field("contract_address", &self.contract_address)
            .field("ss58_prefix", &self.ss58_prefix)
            .field("sandbox", &self.sandbox)
            .field("signer_uri", &"***HIDDEN***")
            .finish_non_exhaustive()
    }
}

/// Periodic driver settings
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub sync_interval: Duration,
    pub checkin_offset: Duration,
    pub startup_delay: Duration,
    pub sync_operator_delay: Duration,
    pub checkin_operator_delay: Duration,
    pub event_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct MinterConfig {
    pub provider: ProviderConfig,
    pub chain: ChainConfig,
    pub schedule: ScheduleConfig,
    /// Operators loaded into the bundled in-memory store
    pub operators: Vec<OperatorCredential>,
}

impl MinterConfig {
    /// Load from process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key → value source
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let provider = ProviderConfig {
            base_url: env.string_or("LUMA_BASE_URL", LUMA_BASE_URL),
            request_interval: Duration::from_millis(env.parse_or("LUMA_REQUEST_INTERVAL_MS", DEFAULT_REQUEST_INTERVAL_MS)?),
            max_retries: env.parse_or("LUMA_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            timeout: Duration::from_secs(env.parse_or("LUMA_TIMEOUT_SECS", DEFAULT_PROVIDER_TIMEOUT_SECS)?),
        };

        let sandbox = env.flag("CHAIN_SANDBOX")?;
        let signer_uri = match env.get("SIGNER_MNEMONIC") {
            Some(uri) => uri,
            None if sandbox => {
                warn!("⚠️ SIGNER_MNEMONIC not set, using the development signer (sandbox only)");
                DEV_SIGNER_URI.to_string()
            }
            None => return Err(AppError::missing_env("SIGNER_MNEMONIC")),
        };
        let rpc_url = match env.get("CHAIN_RPC_URL") {
            Some(url) => url,
            None if sandbox => String::new(),
            None => return Err(AppError::missing_env("CHAIN_RPC_URL")),
        };

        let chain = ChainConfig {
            rpc_url,
            rpc_timeout: Duration::from_secs(env.parse_or("CHAIN_RPC_TIMEOUT_SECS", DEFAULT_RPC_TIMEOUT_SECS)?),
            contract_address: env.get("CONTRACT_ADDRESS").ok_or_else(|| AppError::missing_env("CONTRACT_ADDRESS"))?,
            ss58_prefix: env.parse_or("SS58_PREFIX", DEFAULT_SS58_PREFIX)?,
            contracts_pallet: env.string_or("CONTRACTS_PALLET", DEFAULT_CONTRACTS_PALLET),
            gas_ref_time: env.parse_or("GAS_REF_TIME", DEFAULT_GAS_REF_TIME)?,
            gas_proof_size: env.parse_or("GAS_PROOF_SIZE", DEFAULT_GAS_PROOF_SIZE)?,
            storage_deposit_limit: env.parse_opt("STORAGE_DEPOSIT_LIMIT")?,
            mortal_period: env.parse_or("MORTAL_PERIOD", DEFAULT_MORTAL_PERIOD)?,
            dry_run: env.flag("CHAIN_DRY_RUN")?,
            sandbox,
            mint_selector: env.selector_or("MINT_SELECTOR", MINT_NFT_SELECTOR)?,
            create_event_selector: env.selector_or("CREATE_EVENT_SELECTOR", CREATE_EVENT_SELECTOR)?,
            signer_uri,
        };

        let schedule = ScheduleConfig {
            sync_interval: Duration::from_secs(env.parse_or("SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS)?),
            checkin_offset: Duration::from_secs(env.parse_or("CHECKIN_OFFSET_SECS", DEFAULT_CHECKIN_OFFSET_SECS)?),
            startup_delay: Duration::from_secs(STARTUP_CHECKIN_DELAY_SECS),
            sync_operator_delay: Duration::from_millis(env.parse_or("OPERATOR_DELAY_MS", DEFAULT_SYNC_OPERATOR_DELAY_MS)?),
            checkin_operator_delay: Duration::from_millis(
                env.parse_or("CHECKIN_OPERATOR_DELAY_MS", DEFAULT_CHECKIN_OPERATOR_DELAY_MS)?,
            ),
            event_delay: Duration::from_millis(env.parse_or("EVENT_DELAY_MS", DEFAULT_EVENT_DELAY_MS)?),
        };
        if schedule.sync_interval.is_zero() {
            return Err(AppError::invalid_config("SYNC_INTERVAL_SECS", "0"));
        }

        let operators = match env.get("OPERATOR_CREDENTIALS") {
            Some(raw) => parse_operator_credentials(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            provider,
            chain,
            schedule,
            operators,
        })
    }

    /// Log the effective configuration, secrets masked
    pub fn log_summary(&self) {
        info!("⚙️ Events provider: {}", self.provider.base_url);
        info!(
            "⚙️ Rate limit: {}ms spacing, {} retries",
            self.provider.request_interval.as_millis(),
            self.provider.max_retries
        );
        if self.chain.sandbox {
            info!("⚙️ Chain: sandbox (simulated submissions)");
        } else {
            info!("⚙️ Chain RPC: {}", mask_secret(&self.chain.rpc_url));
        }
        info!("⚙️ Contract: {}", self.chain.contract_address);
        info!(
            "⚙️ Schedule: every {}s, check-ins +{}s",
            self.schedule.sync_interval.as_secs(),
            self.schedule.checkin_offset.as_secs()
        );
        for op in &self.operators {
            info!("🔑 Operator {} configured (key {})", op.operator_id, mask_secret(&op.api_key));
        }
    }
}

/// Parse `id:key[,id:key]`
pub fn parse_operator_credentials(raw: &str) -> AppResult<Vec<OperatorCredential>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((id, key)) if !id.trim().is_empty() && !key.trim().is_empty() => {
                Ok(OperatorCredential::new(id.trim(), key.trim()))
            }
            _ => Err(AppError::invalid_config("OPERATOR_CREDENTIALS", &mask_secret(entry))),
        })
        .collect()
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_opt<T: std::str::FromStr>(&self, key: &str) -> AppResult<Option<T>> {
        match self.get(key) {
            Some(raw) => raw.parse().map(Some).map_err(|_| AppError::invalid_config(key, &raw)),
            None => Ok(None),
        }
    }

    fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> AppResult<T> {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }

    fn flag(&self, key: &str) -> AppResult<bool> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(AppError::invalid_config(key, &v)),
            },
        }
    }

    fn selector_or(&self, key: &str, default: [u8; 4]) -> AppResult<[u8; 4]> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => {
                let mut out = [0u8; 4];
                hex::decode_to_slice(raw.trim_start_matches("0x"), &mut out)
                    .map_err(|_| AppError::invalid_config(key, &raw))?;
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::errors::ErrorCode;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> AppResult<MinterConfig> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        MinterConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_sandbox_defaults() {
        let config = load(&[("CHAIN_SANDBOX", "true"), ("CONTRACT_ADDRESS", "5Contract")]).unwrap();
        assert!(config.chain.sandbox);
        assert_eq!(config.chain.signer_uri, DEV_SIGNER_URI);
        assert_eq!(config.chain.ss58_prefix, 42);
        assert_eq!(config.chain.mint_selector, MINT_NFT_SELECTOR);
        assert_eq!(config.chain.storage_deposit_limit, None);
        assert_eq!(config.provider.request_interval, Duration::from_secs(2));
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.schedule.sync_interval, Duration::from_secs(60));
        assert_eq!(config.schedule.checkin_operator_delay, Duration::from_secs(3));
        assert!(config.operators.is_empty());
    }

    #[test]
    fn test_production_requires_signer_and_rpc() {
        let err = load(&[("CONTRACT_ADDRESS", "5Contract"), ("CHAIN_RPC_URL", "http://node")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissingEnv);
        assert!(err.message.contains("SIGNER_MNEMONIC"));

        let err = load(&[("CONTRACT_ADDRESS", "5Contract"), ("SIGNER_MNEMONIC", "//Bob")]).unwrap_err();
        assert!(err.message.contains("CHAIN_RPC_URL"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let base = [("CHAIN_SANDBOX", "1"), ("CONTRACT_ADDRESS", "5Contract")];

        let err = load(&[base[0], base[1], ("LUMA_MAX_RETRIES", "many")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);

        let err = load(&[base[0], base[1], ("MINT_SELECTOR", "0xzz")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);

        let err = load(&[base[0], base[1], ("SYNC_INTERVAL_SECS", "0")]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);

        let err = load(&[("CHAIN_SANDBOX", "maybe"), base[1]]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CHAIN_SANDBOX", "true"),
            ("CONTRACT_ADDRESS", "5Contract"),
            ("MINT_SELECTOR", "0x219a113e"),
            ("STORAGE_DEPOSIT_LIMIT", "1000000"),
            ("MORTAL_PERIOD", "0"),
            ("OPERATOR_CREDENTIALS", "7:key-a, 9:key-b"),
        ])
        .unwrap();
        assert_eq!(config.chain.mint_selector, [0x21, 0x9a, 0x11, 0x3e]);
        assert_eq!(config.chain.storage_deposit_limit, Some(1_000_000));
        assert_eq!(config.chain.mortal_period, 0);
        assert_eq!(config.operators.len(), 2);
        assert_eq!(config.operators[1].operator_id, "9");
        assert_eq!(config.operators[1].api_key, "key-b");
    }

    #[test]
    fn test_operator_credentials_parse() {
        assert!(parse_operator_credentials("").unwrap().is_empty());
        assert!(parse_operator_credentials("7:abc,").unwrap().len() == 1);
        assert!(parse_operator_credentials("no-separator").is_err());
        assert!(parse_operator_credentials("7:").is_err());
    }
}
