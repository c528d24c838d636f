//! Hyperlane7683 origin data (`OrderData`) codecs.
//!
//! Origin data travels inside each fill instruction and must reach the
//! destination settler byte-for-byte in the encoding that contract expects.
//! EVM settlers take `abi.encode(OrderData)`; Starknet settlers take a packed
//! `Bytes` payload with every static field at its natural width followed by
//! the raw trailing `data`. Converting between the two is lossless.

use crate::networks::ChainFamily;
use alloy_primitives::{Bytes, B256, U256};
use alloy_sol_types::{sol, SolValue};
use thiserror::Error;

/// Byte length of the static part of the packed layout.
pub const PACKED_HEADER_LEN: usize = 32 * 7 + 4 + 4 + 32 + 4;

sol! {
	struct SolOrderData {
		bytes32 sender;
		bytes32 recipient;
		bytes32 inputToken;
		bytes32 outputToken;
		uint256 amountIn;
		uint256 amountOut;
		uint256 senderNonce;
		uint32 originDomain;
		uint32 destinationDomain;
		bytes32 destinationSettler;
		uint32 fillDeadline;
		bytes data;
	}
}

/// Errors produced while decoding origin data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderDataError {
	/// Packed input is shorter than its header.
	#[error("Origin data too short: {0} bytes")]
	TooShort(usize),
	/// The ABI payload is not a valid `OrderData` tuple.
	#[error("Invalid ABI origin data: {0}")]
	Abi(String),
}

/// Decoded origin data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderData {
	pub sender: B256,
	pub recipient: B256,
	pub input_token: B256,
	pub output_token: B256,
	pub amount_in: U256,
	pub amount_out: U256,
	pub sender_nonce: U256,
	pub origin_domain: u32,
	pub destination_domain: u32,
	pub destination_settler: B256,
	pub fill_deadline: u32,
	pub data: Vec<u8>,
}

impl From<&OrderData> for SolOrderData {
	fn from(order: &OrderData) -> Self {
		Self {
			sender: order.sender,
			recipient: order.recipient,
			inputToken: order.input_token,
			outputToken: order.output_token,
			amountIn: order.amount_in,
			amountOut: order.amount_out,
			senderNonce: order.sender_nonce,
			originDomain: order.origin_domain,
			destinationDomain: order.destination_domain,
			destinationSettler: order.destination_settler,
			fillDeadline: order.fill_deadline,
			data: Bytes::copy_from_slice(&order.data),
		}
	}
}

impl From<SolOrderData> for OrderData {
	fn from(order: SolOrderData) -> Self {
		Self {
			sender: order.sender,
			recipient: order.recipient,
			input_token: order.inputToken,
			output_token: order.outputToken,
			amount_in: order.amountIn,
			amount_out: order.amountOut,
			sender_nonce: order.senderNonce,
			origin_domain: order.originDomain,
			destination_domain: order.destinationDomain,
			destination_settler: order.destinationSettler,
			fill_deadline: order.fillDeadline,
			data: order.data.to_vec(),
		}
	}
}

struct PackedReader<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> PackedReader<'a> {
	fn take(&mut self, n: usize) -> Result<&'a [u8], OrderDataError> {
		let end = self.pos + n;
		let slice = self
			.bytes
			.get(self.pos..end)
			.ok_or(OrderDataError::TooShort(self.bytes.len()))?;
		self.pos = end;
		Ok(slice)
	}

	fn b256(&mut self) -> Result<B256, OrderDataError> {
		Ok(B256::from_slice(self.take(32)?))
	}

	fn u256(&mut self) -> Result<U256, OrderDataError> {
		Ok(U256::from_be_slice(self.take(32)?))
	}

	fn u32(&mut self) -> Result<u32, OrderDataError> {
		let raw = self.take(4)?;
		Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
	}
}

impl OrderData {
	/// Encodes as `abi.encode(OrderData)`.
	pub fn encode_abi(&self) -> Vec<u8> {
		SolOrderData::from(self).abi_encode()
	}

	/// Decodes `abi.encode(OrderData)`, rejecting out-of-range fields.
	pub fn decode_abi(bytes: &[u8]) -> Result<Self, OrderDataError> {
		SolOrderData::abi_decode(bytes, true)
			.map(Self::from)
			.map_err(|e| OrderDataError::Abi(e.to_string()))
	}

	/// Encodes in the packed layout used by Starknet settlers.
	pub fn encode_packed(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(PACKED_HEADER_LEN + self.data.len());
		out.extend_from_slice(self.sender.as_slice());
		out.extend_from_slice(self.recipient.as_slice());
		out.extend_from_slice(self.input_token.as_slice());
		out.extend_from_slice(self.output_token.as_slice());
		out.extend_from_slice(&self.amount_in.to_be_bytes::<32>());
		out.extend_from_slice(&self.amount_out.to_be_bytes::<32>());
		out.extend_from_slice(&self.sender_nonce.to_be_bytes::<32>());
		out.extend_from_slice(&self.origin_domain.to_be_bytes());
		out.extend_from_slice(&self.destination_domain.to_be_bytes());
		out.extend_from_slice(self.destination_settler.as_slice());
		out.extend_from_slice(&self.fill_deadline.to_be_bytes());
		out.extend_from_slice(&self.data);
		out
	}

	/// Decodes the packed layout. Everything after the header is `data`.
	pub fn decode_packed(bytes: &[u8]) -> Result<Self, OrderDataError> {
		if bytes.len() < PACKED_HEADER_LEN {
			return Err(OrderDataError::TooShort(bytes.len()));
		}
		let mut r = PackedReader { bytes, pos: 0 };
		Ok(Self {
			sender: r.b256()?,
			recipient: r.b256()?,
			input_token: r.b256()?,
			output_token: r.b256()?,
			amount_in: r.u256()?,
			amount_out: r.u256()?,
			sender_nonce: r.u256()?,
			origin_domain: r.u32()?,
			destination_domain: r.u32()?,
			destination_settler: r.b256()?,
			fill_deadline: r.u32()?,
			data: bytes[PACKED_HEADER_LEN..].to_vec(),
		})
	}
}

/// Re-encodes origin data emitted by a `from` chain for a `to` chain.
///
/// Same-family payloads are returned untouched.
pub fn convert_origin_data(
	origin_data: &[u8],
	from: ChainFamily,
	to: ChainFamily,
) -> Result<Bytes, OrderDataError> {
	let converted = match (from, to) {
		(ChainFamily::Starknet, ChainFamily::Evm) => {
			OrderData::decode_packed(origin_data)?.encode_abi()
		},
		(ChainFamily::Evm, ChainFamily::Starknet) => {
			OrderData::decode_abi(origin_data)?.encode_packed()
		},
		_ => origin_data.to_vec(),
	};
	Ok(Bytes::from(converted))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> OrderData {
		OrderData {
			sender: B256::repeat_byte(0x11),
			recipient: B256::repeat_byte(0x22),
			input_token: B256::repeat_byte(0x33),
			output_token: B256::repeat_byte(0x44),
			amount_in: U256::from(1_000u64),
			amount_out: U256::from(990u64),
			sender_nonce: U256::from(7u8),
			origin_domain: 23448591,
			destination_domain: 10,
			destination_settler: B256::repeat_byte(0x55),
			fill_deadline: 1_700_000_000,
			data: vec![0xaa; 5],
		}
	}

	#[test]
	fn test_abi_layout_offsets() {
		let encoded = sample().encode_abi();
		assert_eq!(encoded.len(), 32 + 12 * 32 + 32 + 32);
		assert_eq!(encoded[31], 0x20);
		let data_offset_word = &encoded[32 + 11 * 32..32 + 12 * 32];
		assert_eq!(U256::from_be_slice(data_offset_word), U256::from(0x180));
		// originDomain is right-aligned in its word
		let domain_word = &encoded[32 + 7 * 32..32 + 8 * 32];
		assert_eq!(&domain_word[28..], &23448591u32.to_be_bytes());
		assert_eq!(&encoded[32 + 13 * 32..32 + 13 * 32 + 5], &[0xaa; 5]);
		assert!(encoded[32 + 13 * 32 + 5..].iter().all(|b| *b == 0));
	}

	#[test]
	fn test_starknet_payload_converts_to_abi() {
		let order = sample();
		let packed = order.encode_packed();
		assert_eq!(packed.len(), PACKED_HEADER_LEN + 5);

		let abi = convert_origin_data(&packed, ChainFamily::Starknet, ChainFamily::Evm).unwrap();
		assert_eq!(abi.to_vec(), order.encode_abi());
		assert_eq!(OrderData::decode_abi(&abi).unwrap(), order);

		let back = convert_origin_data(&abi, ChainFamily::Evm, ChainFamily::Starknet).unwrap();
		assert_eq!(back.to_vec(), packed);
	}

	#[test]
	fn test_same_family_is_verbatim() {
		let raw = vec![1u8, 2, 3];
		let out = convert_origin_data(&raw, ChainFamily::Evm, ChainFamily::Evm).unwrap();
		assert_eq!(out.to_vec(), raw);
	}

	#[test]
	fn test_abi_rejects_bad_input() {
		let mut encoded = sample().encode_abi();
		// originDomain word with bits above uint32
		encoded[32 + 7 * 32] = 0x01;
		assert!(matches!(
			OrderData::decode_abi(&encoded),
			Err(OrderDataError::Abi(_))
		));

		let encoded = sample().encode_abi();
		assert!(matches!(
			OrderData::decode_abi(&encoded[..32 + 12 * 32]),
			Err(OrderDataError::Abi(_))
		));

		assert_eq!(
			OrderData::decode_packed(&[0u8; 10]),
			Err(OrderDataError::TooShort(10))
		);
	}
}
