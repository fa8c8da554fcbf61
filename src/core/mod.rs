//! Core Module - Business Logic
//!
//! Event reconciliation, check-in processing and the mint pipeline
//! (call encoding, extrinsic construction, signing, submission).

pub mod checkin;
pub mod contract;
pub mod encoder;
pub mod event_sync;
pub mod extrinsic;
pub mod metadata;
pub mod minter;
pub mod scheduler;
pub mod signer;
pub mod submitter;

pub use checkin::*;
pub use contract::*;
pub use encoder::*;
pub use event_sync::*;
pub use extrinsic::*;
pub use metadata::*;
pub use minter::*;
pub use scheduler::*;
pub use signer::*;
pub use submitter::*;
