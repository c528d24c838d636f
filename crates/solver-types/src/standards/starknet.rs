//! Starknet serialization primitives.
//!
//! Starknet calldata, call results and event payloads are flat arrays of field
//! elements. Felts are carried as `U256`; values never exceed the Stark prime.
//! Compound types are decoded with [`FeltCursor`], which walks the array
//! sequentially and relies on length prefixes rather than fixed offsets.

use alloy_primitives::{keccak256, U256};
use thiserror::Error;

/// A Starknet field element.
pub type Felt = U256;

/// Errors produced while decoding felt sequences.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeltError {
	/// The sequence ended before the expected element.
	#[error("Unexpected end of felt data reading {0}")]
	UnexpectedEnd(&'static str),
	/// A felt did not fit the target integer width.
	#[error("Felt {value} out of range for {ty}")]
	OutOfRange { ty: &'static str, value: String },
	/// Elements remained after a complete decode.
	#[error("{0} trailing felts after decode")]
	Trailing(usize),
	/// A short string was longer than 31 bytes or not ASCII.
	#[error("Invalid short string: {0}")]
	InvalidShortString(String),
	/// A `Bytes` payload was internally inconsistent.
	#[error("Malformed bytes payload: {0}")]
	MalformedBytes(String),
	/// A JSON-RPC felt was not valid hex.
	#[error("Invalid felt hex '{0}'")]
	InvalidHex(String),
}

/// Entrypoint and event selector: keccak256 truncated to 250 bits.
pub fn selector(name: &str) -> Felt {
	let mut hash = keccak256(name.as_bytes()).0;
	hash[0] &= 0x03;
	U256::from_be_bytes(hash)
}

/// Splits a u256 into its (low, high) 128-bit limbs as Cairo serializes it.
pub fn u256_to_felts(value: U256) -> [Felt; 2] {
	let mask = U256::from(u128::MAX);
	[value & mask, value >> 128]
}

/// Encodes an ASCII string of at most 31 bytes as a short-string felt.
pub fn encode_short_string(s: &str) -> Result<Felt, FeltError> {
	if s.len() > 31 || !s.is_ascii() {
		return Err(FeltError::InvalidShortString(s.to_string()));
	}
	Ok(U256::from_be_slice(s.as_bytes()))
}

/// Decodes a short-string felt. Leading zero bytes are dropped.
pub fn decode_short_string(felt: Felt) -> Result<String, FeltError> {
	let bytes = felt.to_be_bytes::<32>();
	let start = bytes.iter().position(|b| *b != 0).unwrap_or(32);
	let text = &bytes[start..];
	if text.len() > 31 || !text.is_ascii() {
		return Err(FeltError::InvalidShortString(format!("{:#x}", felt)));
	}
	Ok(text.iter().map(|b| *b as char).collect())
}

/// Serializes raw bytes as a Cairo `Bytes` value: `size, words_len, words…`.
///
/// Each word is a u128 holding 16 bytes big-endian; the final word holds the
/// remaining `size % 16` bytes right-aligned.
pub fn encode_bytes(data: &[u8]) -> Vec<Felt> {
	let words: Vec<Felt> = data
		.chunks(16)
		.map(U256::from_be_slice)
		.collect();
	let mut out = Vec::with_capacity(words.len() + 2);
	out.push(U256::from(data.len()));
	out.push(U256::from(words.len()));
	out.extend(words);
	out
}

/// Parses a JSON-RPC felt (`0x` hex, no leading zeros required).
pub fn felt_from_hex(value: &str) -> Result<Felt, FeltError> {
	let digits = value.trim().trim_start_matches("0x");
	if digits.is_empty() || digits.len() > 64 {
		return Err(FeltError::InvalidHex(value.to_string()));
	}
	U256::from_str_radix(digits, 16).map_err(|_| FeltError::InvalidHex(value.to_string()))
}

/// Formats a felt the way JSON-RPC nodes accept it.
pub fn felt_to_hex(felt: Felt) -> String {
	format!("{:#x}", felt)
}

/// Sequential reader over a felt array.
#[derive(Debug)]
pub struct FeltCursor<'a> {
	felts: &'a [Felt],
	pos: usize,
}

impl<'a> FeltCursor<'a> {
	pub fn new(felts: &'a [Felt]) -> Self {
		Self { felts, pos: 0 }
	}

	pub fn remaining(&self) -> usize {
		self.felts.len() - self.pos
	}

	pub fn next_felt(&mut self, what: &'static str) -> Result<Felt, FeltError> {
		let felt = self
			.felts
			.get(self.pos)
			.copied()
			.ok_or(FeltError::UnexpectedEnd(what))?;
		self.pos += 1;
		Ok(felt)
	}

	fn next_bounded(&mut self, what: &'static str, bits: usize) -> Result<U256, FeltError> {
		let felt = self.next_felt(what)?;
		if felt.bit_len() > bits {
			return Err(FeltError::OutOfRange {
				ty: what,
				value: format!("{:#x}", felt),
			});
		}
		Ok(felt)
	}

	pub fn next_u32(&mut self, what: &'static str) -> Result<u32, FeltError> {
		Ok(self.next_bounded(what, 32)?.to::<u32>())
	}

	pub fn next_u64(&mut self, what: &'static str) -> Result<u64, FeltError> {
		Ok(self.next_bounded(what, 64)?.to::<u64>())
	}

	pub fn next_u128(&mut self, what: &'static str) -> Result<u128, FeltError> {
		Ok(self.next_bounded(what, 128)?.to::<u128>())
	}

	/// Reads a Cairo u256 serialized as (low, high).
	pub fn next_u256(&mut self, what: &'static str) -> Result<U256, FeltError> {
		let low = self.next_u128(what)?;
		let high = self.next_u128(what)?;
		Ok((U256::from(high) << 128) | U256::from(low))
	}

	/// Reads an array length prefix, checking it against what is left.
	pub fn next_len(&mut self, what: &'static str) -> Result<usize, FeltError> {
		let len = self.next_u32(what)? as usize;
		if len > self.remaining() {
			return Err(FeltError::UnexpectedEnd(what));
		}
		Ok(len)
	}

	/// Reads a Cairo `Bytes` value.
	pub fn next_bytes(&mut self, what: &'static str) -> Result<Vec<u8>, FeltError> {
		let size = self.next_u32(what)? as usize;
		let words_len = self.next_len(what)?;
		if words_len != size.div_ceil(16) {
			return Err(FeltError::MalformedBytes(format!(
				"{} bytes need {} words, found {}",
				size,
				size.div_ceil(16),
				words_len
			)));
		}
		let mut out = Vec::with_capacity(size);
		for i in 0..words_len {
			let word = self.next_u128(what)?.to_be_bytes();
			let take = if i + 1 == words_len && size % 16 != 0 {
				size % 16
			} else {
				16
			};
			if word[..16 - take].iter().any(|b| *b != 0) {
				return Err(FeltError::MalformedBytes(format!(
					"final word wider than {} bytes",
					take
				)));
			}
			out.extend_from_slice(&word[16 - take..]);
		}
		Ok(out)
	}

	/// Fails when unread felts remain.
	pub fn finish(self) -> Result<(), FeltError> {
		match self.remaining() {
			0 => Ok(()),
			n => Err(FeltError::Trailing(n)),
		}
	}
}
