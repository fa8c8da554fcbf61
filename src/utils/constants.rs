//! Constants Module - Single Source of Truth
//!
//! Protocol constants, provider endpoints and tunable defaults live here.
//! Other modules read them from here instead of hardcoding values.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "AttendanceMinter";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound HTTP requests
pub const USER_AGENT: &str = concat!("AttendanceMinter/", env!("CARGO_PKG_VERSION"));

// ============================================
// EVENTS PROVIDER (LUMA)
// ============================================

/// Public API base URL
pub const LUMA_BASE_URL: &str = "https://api.lu.ma/public/v1";

/// Header carrying the operator's API key
pub const LUMA_API_KEY_HEADER: &str = "x-luma-api-key";

/// Page size for calendar event listing
pub const EVENTS_PAGE_LIMIT: u32 = 50;

/// Page size for guest listing
pub const GUESTS_PAGE_LIMIT: u32 = 500;

/// Minimum interval between provider requests (ms)
pub const DEFAULT_REQUEST_INTERVAL_MS: u64 = 2000;

/// Maximum throttling retries before a request is surfaced as failed
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Provider HTTP timeout (seconds)
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

// ============================================
// SCHEDULING
// ============================================

/// Interval between reconciliation passes (seconds)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Delay between event sync and the check-in pass of the same tick (seconds)
pub const DEFAULT_CHECKIN_OFFSET_SECS: u64 = 30;

/// Delay between operators during event sync (ms)
pub const DEFAULT_SYNC_OPERATOR_DELAY_MS: u64 = 5000;

/// Delay between operators during the check-in pass (ms)
pub const DEFAULT_CHECKIN_OPERATOR_DELAY_MS: u64 = 3000;

/// Delay between events of one operator during the check-in pass (ms)
pub const DEFAULT_EVENT_DELAY_MS: u64 = 2000;

/// Pause between the eager startup event sync and check-in pass (seconds)
pub const STARTUP_CHECKIN_DELAY_SECS: u64 = 5;

// ============================================
// CHAIN CONSTANTS
// ============================================

/// Generic Substrate SS58 network prefix
pub const DEFAULT_SS58_PREFIX: u16 = 42;

/// Context string hashed in front of every SS58 checksum
pub const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";

/// Checksum length for 32-byte account ids
pub const SS58_CHECKSUM_LEN: usize = 2;

/// Lenient decoding rejects keys with this many zero bytes or more
pub const LENIENT_MAX_ZERO_BYTES: usize = 16;

/// Chain RPC timeout (seconds)
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Pallet hosting `call` for ink! contracts
pub const DEFAULT_CONTRACTS_PALLET: &str = "Contracts";

/// Mortal era length in blocks (0 = immortal)
pub const DEFAULT_MORTAL_PERIOD: u64 = 64;

/// Default weight limit: ref_time component
pub const DEFAULT_GAS_REF_TIME: u64 = 100_000_000_000;

/// Default weight limit: proof_size component
pub const DEFAULT_GAS_PROOF_SIZE: u64 = 262_144;

/// Buffer added on top of dry-run estimates (percent)
pub const DRY_RUN_GAS_BUFFER_PERCENT: u64 = 20;

/// Signing payloads longer than this are replaced by their blake2_256 hash
pub const MAX_UNHASHED_PAYLOAD_LEN: usize = 256;

/// Extrinsic format version 4, signed bit set
pub const SIGNED_EXTRINSIC_V4: u8 = 0b1000_0100;

/// Development signer accepted only in sandbox mode
pub const DEV_SIGNER_URI: &str = "//Alice";

// ============================================
// CONTRACT MESSAGES
// ============================================

/// ink! message label of the mint entry point
pub const MINT_NFT_LABEL: &str = "mint_nft";

/// ink! message label of the event creation entry point
pub const CREATE_EVENT_LABEL: &str = "create_event";

/// Selector of `mint_nft` in the deployed contract's ABI (overrides the label-derived one)
pub const MINT_NFT_SELECTOR: [u8; 4] = [0xa5, 0xa4, 0xf7, 0x78];

/// Selector of `create_event`, equal to the label-derived one
pub const CREATE_EVENT_SELECTOR: [u8; 4] = [0x80, 0x67, 0xc4, 0x9f];

// ============================================
// GUEST WALLET EXTRACTION
// ============================================

/// Field names checked (in order) in custom data and on the guest record itself
pub const WALLET_FIELD_NAMES: [&str; 5] = [
    "wallet_address",
    "polkadot_wallet",
    "wallet",
    "dot_wallet",
    "substrate_wallet",
];

/// Registration answer labels recognized as wallet prompts (case-insensitive)
pub const WALLET_ANSWER_LABELS: [&str; 8] = [
    "Wallet Address",
    "Polkadot Wallet",
    "Wallet",
    "DOT Wallet Address",
    "Polkadot Address",
    "Substrate Wallet",
    "Kusama Wallet",
    "DOT Address",
];

/// Location used when the provider carries neither address nor timezone
pub const DEFAULT_EVENT_LOCATION: &str = "Online";

/// Mask a secret for logging: keep a short prefix only
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "***HIDDEN***".to_string()
    } else {
        format!("{}***HIDDEN***", visible)
    }
}
