//! Utility functions for address conversion and string formatting.

pub mod conversion;
pub mod formatting;

pub use conversion::{
	bytes32_to_evm_address, format_address, format_token, parse_bytes32, parse_evm_address,
	to_bytes32, ConversionError,
};
pub use formatting::{hex_string, truncate_id, with_0x_prefix, without_0x_prefix};
