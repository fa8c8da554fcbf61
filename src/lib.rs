//! Attendance Minter Library
//!
//! Keeps a local copy of each operator's events in sync with the events provider and
//! mints one attendance NFT per checked-in guest wallet through an ink! contract on a
//! Substrate chain:
//! - SS58 address decoding with lenient and fallback strategies
//! - ink! call encoding and signed extrinsic construction
//! - Rate-limited provider access with bounded backoff on throttling
//! - Idempotent event reconciliation and check-in processing

pub mod core;
pub mod models;
pub mod providers;
pub mod storage;
pub mod telemetry;
pub mod utils;

pub use crate::core::{
    AttendanceMinter, CallEncoder, CheckInDelays, CheckInProcessor, ContractCall, ContractContext,
    EventSyncReconciler, ScheduleTiming, SignerIdentity, SimulatedSubmitter, SubstrateSubmitter,
    SyncScheduler, TransactionSubmitter,
};
pub use models::{AppError, AppResult, ErrorCode, MinterConfig, MintResult};
pub use providers::{EventsProvider, LumaClient, RateLimiter, SubstrateRpc};
pub use storage::InMemoryStore;
pub use telemetry::{TelemetryCollector, TelemetryStats};
pub use utils::{AddressCodec, DecodeStrategy, DecodedAddress};
