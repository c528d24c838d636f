//! Transaction delivery module for the solver.
//!
//! A [`ChainHandler`] owns everything the solver does on one destination
//! chain: the fill pre-check, token approvals, the fill transaction itself,
//! and settlement back to the origin chain. EVM and Starknet chains each
//! get a handler built on a narrow chain-client trait, so the fill and settle
//! logic can be exercised without a node.

use alloy_primitives::U256;
use async_trait::async_trait;
use solver_types::{
	FillInstruction, OrderAction, OrderStatus, ParsedArgs, RegistryError, SettleOutcome,
};
use std::time::Duration;
use thiserror::Error;

pub mod backoff;
pub mod implementations {
	pub mod evm {
		pub mod alloy;
		pub mod contracts;
		pub mod handler;
	}
	pub mod starknet {
		pub mod handler;
		pub mod rpc;
	}
}

pub use implementations::evm::alloy::{AlloyClientFactory, AlloyEvmClient};
pub use implementations::evm::handler::{EvmChainClient, EvmChainHandler, EvmClientFactory};
pub use implementations::starknet::rpc::{StarknetRpcClient, StarknetRpcClientFactory};
pub use implementations::starknet::handler::{
	StarknetAccount, StarknetCall, StarknetChainClient, StarknetChainHandler,
	StarknetClientFactory,
};

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// A transaction was mined but reverted.
	#[error("Transaction failed: {0}")]
	TransactionFailed(String),
	/// An address could not be parsed for the target chain.
	#[error("Invalid address: {0}")]
	InvalidAddress(String),
	/// The settler reported a status tag the solver does not interpret.
	#[error("Unrecognized order status {0}")]
	UnrecognizedStatus(String),
	/// The order never reached the filled state within the retry budget.
	#[error("Order not filled after {0} attempts")]
	NotFilled(u32),
	/// The shared cancellation token fired.
	#[error("Cancelled")]
	Cancelled,
	/// Error that occurs when a chain is missing from the network registry.
	#[error("Registry error: {0}")]
	Registry(#[from] RegistryError),
	/// Error that occurs when a handler or client cannot be configured.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Settlement retry and routing policy shared by all handlers.
#[derive(Debug, Clone)]
pub struct SettleConfig {
	/// Status polls before giving up on seeing the fill.
	pub max_attempts: u32,
	/// Delay before the second poll; doubles on each further poll.
	pub initial_backoff: Duration,
	/// Settle even when the origin route is not marked live.
	pub fork_mode: bool,
}

impl Default for SettleConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			initial_backoff: Duration::from_secs(1),
			fork_mode: false,
		}
	}
}

/// Fill and settle capability for one destination chain.
///
/// Fill and settle calls on one handler are serialized.
#[async_trait]
pub trait ChainHandler: Send + Sync {
	/// Chain this handler submits transactions to.
	fn chain_id(&self) -> u64;

	/// Delivers the outputs of one fill instruction.
	///
	/// An order already filled or settled is not filled again. A status tag
	/// the settler does not document fails with
	/// [`DeliveryError::UnrecognizedStatus`] and sends nothing.
	async fn fill(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<OrderAction, DeliveryError>;

	/// Triggers settlement of a filled order back to its origin chain.
	async fn settle(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<SettleOutcome, DeliveryError>;

	/// Reads the order status from the destination settler.
	async fn order_status(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<OrderStatus, DeliveryError>;

	/// Solver balance of `token` on this chain; `""` is the native asset.
	async fn balance_of(&self, token: &str) -> Result<U256, DeliveryError>;
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
	/// `0x`-prefixed transaction hash.
	pub hash: String,
	pub success: bool,
}

impl TxOutcome {
	/// Converts a reverted transaction into an error.
	pub fn ensure_success(self, what: &str) -> Result<Self, DeliveryError> {
		if self.success {
			Ok(self)
		} else {
			Err(DeliveryError::TransactionFailed(format!(
				"{} transaction {} reverted",
				what, self.hash
			)))
		}
	}
}

/// Amounts this solver spends on `chain_id`: the native total and a per-token
/// total keyed by the token address as written in the order.
pub(crate) fn spend_on_chain(
	order: &ParsedArgs,
	chain_id: u64,
) -> (U256, std::collections::BTreeMap<String, U256>) {
	let mut native = U256::ZERO;
	let mut tokens = std::collections::BTreeMap::new();
	for output in order
		.resolved_order
		.max_spent
		.iter()
		.filter(|o| o.chain_id == chain_id)
	{
		if output.is_native() {
			native = native.saturating_add(output.amount);
		} else {
			let total: &mut U256 = tokens.entry(output.token.to_lowercase()).or_default();
			*total = total.saturating_add(output.amount);
		}
	}
	(native, tokens)
}

#[cfg(test)]
pub(crate) mod test_support {
	use alloy_primitives::{Bytes, B256, U256};
	use solver_types::{
		FillInstruction, NetworkConfig, NetworkRegistry, Output, ParsedArgs,
		ResolvedCrossChainOrder,
	};

	pub(crate) const ORIGIN_CHAIN: u64 = 1;
	pub(crate) const EVM_DESTINATION: u64 = 10;
	pub(crate) const STARKNET_DESTINATION: u64 = 23448591;

	/// Origin chain 1 (domain 1), optimism, a Starknet chain, and a chain
	/// whose settlement route is not live yet.
	pub(crate) fn registry() -> NetworkRegistry {
		let network = |name: &str, chain_id: u64, domain_id: u32, live: bool| NetworkConfig {
			name: name.to_string(),
			chain_id,
			domain_id,
			rpc_url: format!("http://localhost/{}", name),
			settlement_live: live,
			native_token: Some(format!("0x{}", "ee".repeat(32))),
		};
		NetworkRegistry::new(vec![
			network("ethereum", ORIGIN_CHAIN, 1, true),
			network("optimism", EVM_DESTINATION, 10, true),
			network("starknet-sepolia", STARKNET_DESTINATION, 23448591, true),
			network("pending", 777, 777, false),
		])
		.unwrap()
	}

	pub(crate) fn order(
		origin_chain_id: u64,
		destination: u64,
		settler: &str,
		outputs: Vec<(&str, u64)>,
	) -> ParsedArgs {
		let resolved = ResolvedCrossChainOrder {
			user: format!("0x{}", "11".repeat(20)),
			origin_chain_id,
			open_deadline: 0,
			fill_deadline: u64::from(u32::MAX),
			order_id: B256::repeat_byte(0xab),
			max_spent: outputs
				.into_iter()
				.map(|(token, amount)| Output {
					token: token.to_string(),
					amount: U256::from(amount),
					recipient: format!("0x{}", "22".repeat(20)),
					chain_id: destination,
				})
				.collect(),
			min_received: vec![],
			fill_instructions: vec![FillInstruction {
				destination_chain_id: destination,
				destination_settler: settler.to_string(),
				origin_data: Bytes::from(vec![0xd0, 0xd1, 0xd2]),
			}],
		};
		ParsedArgs::new(resolved, |_| None)
	}
}
