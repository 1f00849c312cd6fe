//! Hot-wallet flow detection engine.
//!
//! Turns new blocks into per-contract windowed token flows and raises an
//! alert when a sender or receiver moves more than a token's threshold.
//!
//! ## Architecture
//!
//! - `monitor` - `HotWalletMonitor`, the block ingestion loop
//! - `extractor` - ERC-20 `Transfer` log decoding
//! - `window` - `WindowedFlowAggregator`, rolling sums, breaches, cooldowns
//! - `metadata` - Token decimals/symbol cache
//! - `code` - Contract bytecode existence cache

pub mod code;
pub mod config;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod monitor;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use code::*;
pub use config::*;
pub use error::*;
pub use extractor::*;
pub use metadata::*;
pub use monitor::*;
pub use window::*;
