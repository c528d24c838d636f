//! Address normalization between chain-native and canonical 32-byte forms.
//!
//! Every address that crosses a chain boundary is carried as a left-padded
//! `[u8; 32]`. EVM addresses occupy the trailing 20 bytes; Starknet addresses
//! (felts) already fill up to 32 bytes.

use super::formatting::without_0x_prefix;
use crate::networks::ChainFamily;
use alloy_primitives::Address;
use thiserror::Error;

/// Errors produced while converting addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
	/// The input is longer than 32 bytes.
	#[error("Address too long: {0} bytes")]
	TooLong(usize),
	/// The input is not valid hex.
	#[error("Invalid hex address '{0}'")]
	InvalidHex(String),
}

/// Left-pads a chain-native address to the canonical 32-byte form.
///
/// A 20-byte EVM address gains 12 zero bytes; a 31-byte address gains one.
pub fn to_bytes32(address: &[u8]) -> Result<[u8; 32], ConversionError> {
	if address.len() > 32 {
		return Err(ConversionError::TooLong(address.len()));
	}
	let mut out = [0u8; 32];
	out[32 - address.len()..].copy_from_slice(address);
	Ok(out)
}

/// Extracts the EVM address from the trailing 20 bytes of a canonical value.
pub fn bytes32_to_evm_address(bytes32: &[u8; 32]) -> Address {
	Address::from_slice(&bytes32[12..])
}

/// Parses a `0x` hex address of any width up to 32 bytes into canonical form.
///
/// Odd-length hex (common for Starknet felts) is accepted.
pub fn parse_bytes32(address: &str) -> Result<[u8; 32], ConversionError> {
	let digits = without_0x_prefix(address.trim());
	if digits.is_empty() {
		return Ok([0u8; 32]);
	}
	let padded;
	let digits = if digits.len() % 2 == 1 {
		padded = format!("0{}", digits);
		padded.as_str()
	} else {
		digits
	};
	let bytes = hex::decode(digits).map_err(|_| ConversionError::InvalidHex(address.to_string()))?;
	to_bytes32(&bytes)
}

/// Parses an EVM address from any hex width, keeping the trailing 20 bytes.
pub fn parse_evm_address(address: &str) -> Result<Address, ConversionError> {
	parse_bytes32(address).map(|b| bytes32_to_evm_address(&b))
}

/// Formats a canonical address the way the given chain family writes it.
///
/// EVM: `0x` + 40 hex digits. Starknet: `0x` + 64 hex digits.
pub fn format_address(bytes32: &[u8; 32], family: ChainFamily) -> String {
	match family {
		ChainFamily::Evm => format!("0x{}", hex::encode(&bytes32[12..])),
		ChainFamily::Starknet => format!("0x{}", hex::encode(bytes32)),
	}
}

/// Formats a token address, rendering the zero address as `""` (native asset).
pub fn format_token(bytes32: &[u8; 32], family: ChainFamily) -> String {
	if bytes32.iter().all(|b| *b == 0) {
		String::new()
	} else {
		format_address(bytes32, family)
	}
}
