//! Fill and settle on EVM destination chains.

use super::contracts::{IDestinationSettler, IERC20};
use crate::backoff::poll_with_backoff;
use crate::{spend_on_chain, ChainHandler, DeliveryError, SettleConfig, TxOutcome};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use solver_types::utils::parse_evm_address;
use solver_types::{
	truncate_id, FillInstruction, NetworkRegistry, OrderAction, OrderStatus, ParsedArgs,
	RegistryError, SettleOutcome,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A transaction the handler wants mined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmCall {
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
}

/// Node access for one EVM chain, bound to the solver's signer.
#[async_trait]
pub trait EvmChainClient: Send + Sync {
	fn chain_id(&self) -> u64;

	/// Address that signs and pays for transactions.
	fn signer_address(&self) -> Address;

	/// Executes a read-only call against the latest block.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeliveryError>;

	async fn native_balance(&self, owner: Address) -> Result<U256, DeliveryError>;

	/// Signs, submits and waits for the receipt of a transaction.
	async fn send(&self, call: EvmCall) -> Result<TxOutcome, DeliveryError>;
}

/// Builds chain clients on demand.
pub trait EvmClientFactory: Send + Sync {
	fn create(&self, chain_id: u64) -> Result<Arc<dyn EvmChainClient>, DeliveryError>;
}

fn parse_address(address: &str) -> Result<Address, DeliveryError> {
	parse_evm_address(address).map_err(|e| DeliveryError::InvalidAddress(e.to_string()))
}

/// [`ChainHandler`] for EVM destination chains.
pub struct EvmChainHandler {
	client: Arc<dyn EvmChainClient>,
	registry: Arc<NetworkRegistry>,
	settle: SettleConfig,
	cancel: CancellationToken,
	lock: Mutex<()>,
}

impl EvmChainHandler {
	pub fn new(
		client: Arc<dyn EvmChainClient>,
		registry: Arc<NetworkRegistry>,
		settle: SettleConfig,
		cancel: CancellationToken,
	) -> Self {
		Self {
			client,
			registry,
			settle,
			cancel,
			lock: Mutex::new(()),
		}
	}

	async fn read<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return, DeliveryError> {
		let data = self.client.call(to, call.abi_encode().into()).await?;
		C::abi_decode_returns(&data, true).map_err(|e| {
			DeliveryError::Network(format!("Failed to decode {} result: {}", C::SIGNATURE, e))
		})
	}

	async fn submit(&self, call: EvmCall, what: &str) -> Result<TxOutcome, DeliveryError> {
		let outcome = tokio::select! {
			_ = self.cancel.cancelled() => return Err(DeliveryError::Cancelled),
			outcome = self.client.send(call) => outcome?,
		};
		let outcome = outcome.ensure_success(what)?;
		tracing::info!(
			chain_id = self.client.chain_id(),
			tx_hash = %outcome.hash,
			"{} transaction mined",
			what
		);
		Ok(outcome)
	}

	async fn status(&self, settler: Address, order_id: B256) -> Result<OrderStatus, DeliveryError> {
		let tag = self
			.read(settler, IDestinationSettler::orderStatusCall { orderId: order_id })
			.await?
			.status;
		let status = OrderStatus::from_evm_tag(&tag);
		if let OrderStatus::Unrecognized(raw) = &status {
			tracing::warn!(tag = %raw, "Settler returned an unrecognized status");
		}
		Ok(status)
	}

	async fn approve_if_needed(
		&self,
		token: &str,
		amount: U256,
		spender: Address,
	) -> Result<(), DeliveryError> {
		let token = parse_address(token)?;
		let allowance = self
			.read(
				token,
				IERC20::allowanceCall {
					owner: self.client.signer_address(),
					spender,
				},
			)
			.await?
			.amount;
		if allowance >= amount {
			return Ok(());
		}

		tracing::info!(token = %token, %allowance, %amount, "Approving settler");
		let data = IERC20::approveCall {
			spender,
			amount: U256::MAX,
		}
		.abi_encode();
		self.submit(
			EvmCall {
				to: token,
				data: data.into(),
				value: U256::ZERO,
			},
			"Approve",
		)
		.await?;
		Ok(())
	}
}

#[async_trait]
impl ChainHandler for EvmChainHandler {
	fn chain_id(&self) -> u64 {
		self.client.chain_id()
	}

	async fn fill(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<OrderAction, DeliveryError> {
		let _guard = self.lock.lock().await;
		let order_id = order.order_id_bytes();
		let settler = parse_address(&instruction.destination_settler)?;

		match self.status(settler, order_id).await? {
			status if status.is_filled_or_settled() => {
				tracing::info!(order_id = %truncate_id(&order.order_id), %status, "Already filled");
				return Ok(OrderAction::Settle);
			},
			// Unknown tags never fall through to a fill
			OrderStatus::Unrecognized(tag) => return Err(DeliveryError::UnrecognizedStatus(tag)),
			_ => {},
		}

		let (native_value, tokens) = spend_on_chain(order, self.client.chain_id());
		for (token, amount) in &tokens {
			self.approve_if_needed(token, *amount, settler).await?;
		}

		let data = IDestinationSettler::fillCall {
			orderId: order_id,
			originData: instruction.origin_data.clone(),
			fillerData: Bytes::new(),
		}
		.abi_encode();
		self.submit(
			EvmCall {
				to: settler,
				data: data.into(),
				value: native_value,
			},
			"Fill",
		)
		.await?;

		Ok(OrderAction::Settle)
	}

	async fn settle(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<SettleOutcome, DeliveryError> {
		let order_id = order.order_id_bytes();
		let settler = parse_address(&instruction.destination_settler)?;

		let status = poll_with_backoff(
			self.settle.max_attempts,
			self.settle.initial_backoff,
			&self.cancel,
			|attempt| async move {
				let status = self.status(settler, order_id).await?;
				tracing::debug!(attempt, %status, "Waiting for fill");
				Ok::<_, DeliveryError>(match status {
					OrderStatus::Filled | OrderStatus::Settled => Some(status),
					_ => None,
				})
			},
		)
		.await?;
		if status == OrderStatus::Settled {
			return Ok(SettleOutcome::AlreadySettled);
		}

		let origin_chain_id = order.resolved_order.origin_chain_id;
		let origin = self
			.registry
			.by_chain_id(origin_chain_id)
			.ok_or(RegistryError::UnknownChain(origin_chain_id))?;
		if !origin.settlement_live && !self.settle.fork_mode {
			return Ok(SettleOutcome::Skipped(format!(
				"settlement route to {} is not live",
				origin.name
			)));
		}

		let _guard = self.lock.lock().await;
		let fee = self
			.read(
				settler,
				IDestinationSettler::quoteGasPaymentCall {
					destinationDomain: origin.domain_id,
				},
			)
			.await?
			.fee;

		let data = IDestinationSettler::settleCall {
			orderIds: vec![order_id],
		}
		.abi_encode();
		self.submit(
			EvmCall {
				to: settler,
				data: data.into(),
				value: fee,
			},
			"Settle",
		)
		.await?;

		Ok(SettleOutcome::Settled)
	}

	async fn order_status(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<OrderStatus, DeliveryError> {
		let settler = parse_address(&instruction.destination_settler)?;
		self.status(settler, order.order_id_bytes()).await
	}

	async fn balance_of(&self, token: &str) -> Result<U256, DeliveryError> {
		let owner = self.client.signer_address();
		if token.is_empty() {
			return self.client.native_balance(owner).await;
		}
		Ok(self
			.read(parse_address(token)?, IERC20::balanceOfCall { account: owner })
			.await?
			.balance)
	}
}
