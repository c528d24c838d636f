//! Cross-chain order standards and their wire encodings.

/// Canonical EIP-7683 resolved order model
pub mod eip7683;
/// Hyperlane7683 origin data codecs
pub mod order_data;
/// Starknet felt serialization
pub mod starknet;

pub use eip7683::{FillInstruction, Output, ResolvedCrossChainOrder};
pub use order_data::{convert_origin_data, OrderData, OrderDataError};
pub use starknet::{felt_from_hex, felt_to_hex, Felt, FeltCursor, FeltError};
