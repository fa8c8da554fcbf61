//! Utils Module - Address codec, clock and shared constants

pub mod address;
pub mod clock;
pub mod constants;

pub use address::*;
pub use clock::*;
pub use constants::*;
