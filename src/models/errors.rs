//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so background failures can be
//! grepped out of the logs and manual mint requests can surface the exact reason.
//!
//! Error codes follow pattern: CATEGORY_SPECIFIC_ERROR
//! - ADDR_xxx: address decoding
//! - ENC_xxx: contract call encoding
//! - PROVIDER_xxx: events provider (HTTP) errors
//! - CHAIN_xxx: blockchain RPC / extrinsic pipeline errors, one per submission step
//! - SIGN_xxx: signer identity errors
//! - STORE_xxx: repository errors
//! - CFG_xxx: configuration errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Re-tag an error with the pipeline step that produced it, keeping the message
    pub fn at_step(self, code: ErrorCode) -> Self {
        Self {
            code,
            message: self.message,
            source: self.source,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // Address Errors
    // ============================================
    /// Address could not be decoded by any real strategy
    AddressInvalid,
    /// Address only resolved to a hashed pseudo-identifier
    AddressNotAnAccount,

    // ============================================
    // Encoding Errors
    // ============================================
    /// Contract call arguments have an invalid shape
    EncodeInvalidArgument,

    // ============================================
    // Events Provider Errors
    // ============================================
    /// Provider rejected the API key
    ProviderUnauthorized,
    /// Provider kept throttling past the retry cap
    ProviderRateLimited,
    /// Provider returned a non-success HTTP status
    ProviderHttp,
    /// Provider could not be reached / timed out
    ProviderUnavailable,
    /// Provider response did not match the expected shape
    ProviderInvalidResponse,

    // ============================================
    // Chain Errors (one per submission step)
    // ============================================
    /// Node could not be reached
    ChainConnectionFailed,
    /// Runtime metadata fetch or decode failed
    ChainMetadataFetch,
    /// Signer account nonce read failed
    ChainNonceFetch,
    /// Genesis / era block hash fetch failed
    ChainBlockHashFetch,
    /// Runtime version fetch failed
    ChainRuntimeVersionFetch,
    /// Call or envelope could not be constructed
    ChainCallConstruction,
    /// Signing the envelope failed
    ChainSigning,
    /// Node rejected the extrinsic
    ChainSubmission,
    /// Generic JSON-RPC error
    ChainRpc,

    // ============================================
    // Signer Errors
    // ============================================
    /// Signer identity could not be constructed
    SignerInvalid,

    // ============================================
    // Storage Errors
    // ============================================
    /// Record not found
    StoreNotFound,
    /// Uniqueness violated
    StoreConflict,
    /// Generic storage failure
    StoreFailure,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Missing environment variable
    ConfigMissingEnv,
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Generic Errors
    // ============================================
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddressInvalid => "ADDR_INVALID",
            Self::AddressNotAnAccount => "ADDR_NOT_AN_ACCOUNT",

            Self::EncodeInvalidArgument => "ENC_INVALID_ARGUMENT",

            Self::ProviderUnauthorized => "PROVIDER_UNAUTHORIZED",
            Self::ProviderRateLimited => "PROVIDER_RATE_LIMITED",
            Self::ProviderHttp => "PROVIDER_HTTP_ERROR",
            Self::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            Self::ProviderInvalidResponse => "PROVIDER_INVALID_RESPONSE",

            Self::ChainConnectionFailed => "CHAIN_CONNECTION_FAILED",
            Self::ChainMetadataFetch => "CHAIN_METADATA_FETCH",
            Self::ChainNonceFetch => "CHAIN_NONCE_FETCH",
            Self::ChainBlockHashFetch => "CHAIN_BLOCK_HASH_FETCH",
            Self::ChainRuntimeVersionFetch => "CHAIN_RUNTIME_VERSION_FETCH",
            Self::ChainCallConstruction => "CHAIN_CALL_CONSTRUCTION",
            Self::ChainSigning => "CHAIN_SIGNING",
            Self::ChainSubmission => "CHAIN_SUBMISSION",
            Self::ChainRpc => "CHAIN_RPC_ERROR",

            Self::SignerInvalid => "SIGN_INVALID_SIGNER",

            Self::StoreNotFound => "STORE_NOT_FOUND",
            Self::StoreConflict => "STORE_CONFLICT",
            Self::StoreFailure => "STORE_FAILURE",

            Self::ConfigMissingEnv => "CFG_MISSING_ENV",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Check if error is retryable on the next scheduled pass
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimited
                | Self::ProviderUnavailable
                | Self::ChainConnectionFailed
                | Self::ChainMetadataFetch
                | Self::ChainNonceFetch
                | Self::ChainBlockHashFetch
                | Self::ChainRuntimeVersionFetch
                | Self::ChainSubmission
                | Self::ChainRpc
        )
    }

    /// Credential-level failures abort the operator's pass early
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, Self::ProviderUnauthorized)
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// Provider rejected the API key
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderUnauthorized, msg)
    }

    /// Provider throttled past the retry cap
    pub fn rate_limited(retries: u32) -> Self {
        Self::new(
            ErrorCode::ProviderRateLimited,
            format!("Rate limited (HTTP 429) after {} retries", retries),
        )
    }

    /// Invalid contract call argument
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::EncodeInvalidArgument, msg)
    }

    /// Chain RPC error
    pub fn chain_rpc(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChainRpc, msg)
    }

    /// Envelope construction error
    pub fn construction(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChainCallConstruction, msg)
    }

    /// Storage failure
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreFailure, msg)
    }

    /// Missing environment variable
    pub fn missing_env(key_name: &str) -> Self {
        Self::new(
            ErrorCode::ConfigMissingEnv,
            format!("Missing environment variable: {}", key_name),
        )
    }

    /// Invalid configuration value
    pub fn invalid_config(key_name: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for {}: {:?}", key_name, value),
        )
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::Unknown, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ProviderUnavailable, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ProviderUnavailable, "Connection failed")
        } else if err.is_decode() {
            Self::with_source(ErrorCode::ProviderInvalidResponse, "Response body decode failed", err)
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::ProviderInvalidResponse, "JSON parse error", err)
    }
}

impl From<hex::FromHexError> for AppError {
    fn from(err: hex::FromHexError) -> Self {
        Self::with_source(ErrorCode::ChainRpc, "Invalid hex in RPC response", err)
    }
}

impl From<parity_scale_codec::Error> for AppError {
    fn from(err: parity_scale_codec::Error) -> Self {
        Self::with_source(ErrorCode::ChainRpc, "SCALE decode error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::rate_limited(3);
        assert_eq!(err.code, ErrorCode::ProviderRateLimited);
        assert_eq!(err.code_str(), "PROVIDER_RATE_LIMITED");
        assert!(err.to_string().starts_with("[PROVIDER_RATE_LIMITED]"));
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::ChainNonceFetch.is_retryable());
        assert!(ErrorCode::ProviderRateLimited.is_retryable());
        assert!(!ErrorCode::EncodeInvalidArgument.is_retryable());
        assert!(!ErrorCode::ProviderUnauthorized.is_retryable());
    }

    #[test]
    fn test_at_step_keeps_message() {
        let err = AppError::chain_rpc("RPC error: boom (code: -32000)").at_step(ErrorCode::ChainSubmission);
        assert_eq!(err.code, ErrorCode::ChainSubmission);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn test_credential_failure() {
        assert!(ErrorCode::ProviderUnauthorized.is_credential_failure());
        assert!(!ErrorCode::ProviderHttp.is_credential_failure());
    }
}
