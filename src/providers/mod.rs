//! Providers Module - External Data Sources
//!
//! Events provider (REST) and chain node (JSON-RPC) clients.

pub mod luma;
pub mod rate_limit;
pub mod rpc;

pub use luma::*;
pub use rate_limit::*;
pub use rpc::*;
