//! EIP-7683 cross-chain order types.
//!
//! The canonical, chain-independent view of an opened order. Both the ABI
//! decoder (EVM origin chains) and the felt decoder (Starknet origin chains)
//! produce these values.

use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// An order after resolution by its origin settler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCrossChainOrder {
	/// Order creator, formatted for the origin chain.
	pub user: String,
	pub origin_chain_id: u64,
	pub open_deadline: u64,
	pub fill_deadline: u64,
	/// Identifier assigned by the origin contract; identical on every chain.
	pub order_id: B256,
	/// Assets the filler must deliver, in order.
	pub max_spent: Vec<Output>,
	/// Assets the filler receives on settlement, in order.
	pub min_received: Vec<Output>,
	/// One entry per destination leg, in order.
	pub fill_instructions: Vec<FillInstruction>,
}

/// A token movement on a single chain.
///
/// Addresses are formatted for the chain the output lives on; an empty
/// `token` denotes the chain's native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
	pub token: String,
	pub amount: U256,
	pub recipient: String,
	pub chain_id: u64,
}

impl Output {
	pub fn is_native(&self) -> bool {
		self.token.is_empty()
	}
}

/// Instructions for one destination leg of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillInstruction {
	pub destination_chain_id: u64,
	/// Settlement contract on the destination chain.
	pub destination_settler: String,
	/// Opaque payload replayed verbatim to `fill`, already in the
	/// destination chain's encoding.
	pub origin_data: Bytes,
}
