//! Core data types for on-chain flow monitoring.

pub mod address;
pub mod amount;
pub mod chain;
pub mod sink;
pub mod transfer;

pub use address::*;
pub use amount::*;
pub use chain::*;
pub use sink::*;
pub use transfer::*;
