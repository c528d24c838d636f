//! Fill and settle on Starknet destination chains.
//!
//! Starknet has no value-carrying calls: native outputs and the messaging fee
//! are paid in the network's native token, approved to the settler inside the
//! same multicall as `fill` or `settle`.

use crate::backoff::poll_with_backoff;
use crate::{spend_on_chain, ChainHandler, DeliveryError, SettleConfig, TxOutcome};
use alloy_primitives::U256;
use async_trait::async_trait;
use solver_types::standards::starknet::{encode_bytes, selector, u256_to_felts};
use solver_types::standards::{Felt, FeltCursor};
use solver_types::utils::parse_bytes32;
use solver_types::{
	truncate_id, FillInstruction, NetworkRegistry, OrderAction, OrderStatus, ParsedArgs,
	RegistryError, SettleOutcome,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// One entry of an account multicall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarknetCall {
	pub to: Felt,
	pub selector: Felt,
	pub calldata: Vec<Felt>,
}

impl StarknetCall {
	pub fn new(to: Felt, entrypoint: &str, calldata: Vec<Felt>) -> Self {
		Self {
			to,
			selector: selector(entrypoint),
			calldata,
		}
	}
}

/// Signs and submits invoke transactions for the solver's Starknet account.
#[async_trait]
pub trait StarknetAccount: Send + Sync {
	fn address(&self) -> Felt;

	/// Submits a multicall, returning the transaction hash.
	async fn execute(&self, calls: Vec<StarknetCall>) -> Result<Felt, DeliveryError>;
}

/// Node access for one Starknet chain, bound to the solver's account.
#[async_trait]
pub trait StarknetChainClient: Send + Sync {
	fn chain_id(&self) -> u64;

	fn account_address(&self) -> Felt;

	/// Calls a view entrypoint against the latest block.
	async fn call(
		&self,
		contract: Felt,
		entrypoint: &str,
		calldata: Vec<Felt>,
	) -> Result<Vec<Felt>, DeliveryError>;

	/// Submits a multicall and waits for its receipt.
	async fn execute(&self, calls: Vec<StarknetCall>) -> Result<TxOutcome, DeliveryError>;
}

/// Builds Starknet clients on demand.
pub trait StarknetClientFactory: Send + Sync {
	fn create(&self, chain_id: u64) -> Result<Arc<dyn StarknetChainClient>, DeliveryError>;
}

fn parse_felt_address(address: &str) -> Result<Felt, DeliveryError> {
	parse_bytes32(address)
		.map(U256::from_be_bytes)
		.map_err(|e| DeliveryError::InvalidAddress(e.to_string()))
}

fn read_u256(result: &[Felt], what: &'static str) -> Result<U256, DeliveryError> {
	FeltCursor::new(result)
		.next_u256(what)
		.map_err(|e| DeliveryError::Network(format!("Bad {} result: {}", what, e)))
}

/// [`ChainHandler`] for Starknet destination chains.
pub struct StarknetChainHandler {
	client: Arc<dyn StarknetChainClient>,
	registry: Arc<NetworkRegistry>,
	settle: SettleConfig,
	cancel: CancellationToken,
	lock: Mutex<()>,
}

impl StarknetChainHandler {
	pub fn new(
		client: Arc<dyn StarknetChainClient>,
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

	fn native_token(&self) -> Result<Felt, DeliveryError> {
		let chain_id = self.client.chain_id();
		let network = self
			.registry
			.by_chain_id(chain_id)
			.ok_or(RegistryError::UnknownChain(chain_id))?;
		let token = network.native_token.as_deref().ok_or_else(|| {
			DeliveryError::Configuration(format!("No native_token configured for {}", network.name))
		})?;
		parse_felt_address(token)
	}

	async fn submit(&self, calls: Vec<StarknetCall>, what: &str) -> Result<TxOutcome, DeliveryError> {
		let outcome = tokio::select! {
			_ = self.cancel.cancelled() => return Err(DeliveryError::Cancelled),
			outcome = self.client.execute(calls) => outcome?,
		};
		let outcome = outcome.ensure_success(what)?;
		tracing::info!(
			chain_id = self.client.chain_id(),
			tx_hash = %outcome.hash,
			"{} transaction accepted",
			what
		);
		Ok(outcome)
	}

	async fn status(&self, settler: Felt, order_id: U256) -> Result<OrderStatus, DeliveryError> {
		let result = self
			.client
			.call(settler, "order_status", u256_to_felts(order_id).to_vec())
			.await?;
		let tag = result
			.first()
			.copied()
			.ok_or_else(|| DeliveryError::Network("Empty order_status result".to_string()))?;
		let status = OrderStatus::from_felt_tag(tag);
		if let OrderStatus::Unrecognized(raw) = &status {
			tracing::warn!(tag = %raw, "Settler returned an unrecognized status");
		}
		Ok(status)
	}

	/// Approve calls needed so `spender` can pull each token amount.
	async fn approvals(
		&self,
		amounts: &BTreeMap<Felt, U256>,
		spender: Felt,
	) -> Result<Vec<StarknetCall>, DeliveryError> {
		let owner = self.client.account_address();
		let mut calls = Vec::new();
		for (token, amount) in amounts {
			let result = self
				.client
				.call(*token, "allowance", vec![owner, spender])
				.await?;
			let allowance = read_u256(&result, "allowance")?;
			if allowance < *amount {
				let mut calldata = vec![spender];
				calldata.extend(u256_to_felts(U256::MAX));
				calls.push(StarknetCall::new(*token, "approve", calldata));
			}
		}
		Ok(calls)
	}
}

#[async_trait]
impl ChainHandler for StarknetChainHandler {
	fn chain_id(&self) -> u64 {
		self.client.chain_id()
	}

	async fn fill(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<OrderAction, DeliveryError> {
		let _guard = self.lock.lock().await;
		let order_id = U256::from_be_bytes(order.order_id_bytes().0);
		let settler = parse_felt_address(&instruction.destination_settler)?;

		match self.status(settler, order_id).await? {
			status if status.is_filled_or_settled() => {
				tracing::info!(order_id = %truncate_id(&order.order_id), %status, "Already filled");
				return Ok(OrderAction::Settle);
			},
			// Unknown tags never fall through to a fill
			OrderStatus::Unrecognized(tag) => return Err(DeliveryError::UnrecognizedStatus(tag)),
			_ => {},
		}

		let (native, tokens) = spend_on_chain(order, self.client.chain_id());
		let mut amounts: BTreeMap<Felt, U256> = BTreeMap::new();
		for (token, amount) in tokens {
			let total = amounts.entry(parse_felt_address(&token)?).or_default();
			*total = total.saturating_add(amount);
		}
		if !native.is_zero() {
			let total = amounts.entry(self.native_token()?).or_default();
			*total = total.saturating_add(native);
		}

		let mut calls = self.approvals(&amounts, settler).await?;
		let mut calldata = u256_to_felts(order_id).to_vec();
		calldata.extend(encode_bytes(&instruction.origin_data));
		calldata.extend(encode_bytes(&[]));
		calls.push(StarknetCall::new(settler, "fill", calldata));

		self.submit(calls, "Fill").await?;
		Ok(OrderAction::Settle)
	}

	async fn settle(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<SettleOutcome, DeliveryError> {
		let order_id = U256::from_be_bytes(order.order_id_bytes().0);
		let settler = parse_felt_address(&instruction.destination_settler)?;

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
		let quote = self
			.client
			.call(
				settler,
				"quote_gas_payment",
				vec![Felt::from(origin.domain_id)],
			)
			.await?;
		let fee = read_u256(&quote, "quote_gas_payment")?;

		let mut calls = Vec::new();
		if !fee.is_zero() {
			let mut fee_amount = BTreeMap::new();
			fee_amount.insert(self.native_token()?, fee);
			calls = self.approvals(&fee_amount, settler).await?;
		}
		// settle(order_ids: Array<u256>, value: u256)
		let mut calldata = vec![Felt::from(1u8)];
		calldata.extend(u256_to_felts(order_id));
		calldata.extend(u256_to_felts(fee));
		calls.push(StarknetCall::new(settler, "settle", calldata));

		self.submit(calls, "Settle").await?;
		Ok(SettleOutcome::Settled)
	}

	async fn order_status(
		&self,
		order: &ParsedArgs,
		instruction: &FillInstruction,
	) -> Result<OrderStatus, DeliveryError> {
		let settler = parse_felt_address(&instruction.destination_settler)?;
		self.status(settler, U256::from_be_bytes(order.order_id_bytes().0))
			.await
	}

	async fn balance_of(&self, token: &str) -> Result<U256, DeliveryError> {
		let token = if token.is_empty() {
			self.native_token()?
		} else {
			parse_felt_address(token)?
		};
		let result = self
			.client
			.call(token, "balance_of", vec![self.client.account_address()])
			.await?;
		read_u256(&result, "balance_of")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{order, registry, ORIGIN_CHAIN, STARKNET_DESTINATION};
	use solver_types::standards::starknet::encode_short_string;
	use std::sync::Mutex as StdMutex;
	use std::time::Duration;

	fn settler() -> String {
		format!("0x{}", "05".repeat(32))
	}

	fn token() -> String {
		format!("0x{}", "04".repeat(32))
	}

	fn native() -> Felt {
		parse_felt_address(&format!("0x{}", "ee".repeat(32))).unwrap()
	}

	struct FakeStarknetClient {
		status: StdMutex<Felt>,
		allowance: U256,
		fee: U256,
		executed: StdMutex<Vec<Vec<StarknetCall>>>,
	}

	impl FakeStarknetClient {
		fn new(allowance: u64, fee: u64) -> Self {
			Self {
				status: StdMutex::new(Felt::ZERO),
				allowance: U256::from(allowance),
				fee: U256::from(fee),
				executed: StdMutex::new(vec![]),
			}
		}
	}

	#[async_trait]
	impl StarknetChainClient for FakeStarknetClient {
		fn chain_id(&self) -> u64 {
			STARKNET_DESTINATION
		}

		fn account_address(&self) -> Felt {
			Felt::from(0x777u32)
		}

		async fn call(
			&self,
			_contract: Felt,
			entrypoint: &str,
			_calldata: Vec<Felt>,
		) -> Result<Vec<Felt>, DeliveryError> {
			Ok(match entrypoint {
				"order_status" => vec![*self.status.lock().unwrap()],
				"allowance" => u256_to_felts(self.allowance).to_vec(),
				"quote_gas_payment" => u256_to_felts(self.fee).to_vec(),
				"balance_of" => u256_to_felts(U256::from(9u8)).to_vec(),
				other => return Err(DeliveryError::Network(format!("unexpected {}", other))),
			})
		}

		async fn execute(&self, calls: Vec<StarknetCall>) -> Result<TxOutcome, DeliveryError> {
			if calls.iter().any(|c| c.selector == selector("fill")) {
				*self.status.lock().unwrap() = encode_short_string("FILLED").unwrap();
			}
			let mut executed = self.executed.lock().unwrap();
			executed.push(calls);
			Ok(TxOutcome {
				hash: format!("0x{:x}", executed.len()),
				success: true,
			})
		}
	}

	fn handler(client: Arc<FakeStarknetClient>) -> StarknetChainHandler {
		StarknetChainHandler::new(
			client,
			Arc::new(registry()),
			SettleConfig {
				max_attempts: 2,
				initial_backoff: Duration::from_millis(10),
				fork_mode: false,
			},
			CancellationToken::new(),
		)
	}

	#[tokio::test]
	async fn test_fill_multicall_approves_token_and_native() {
		let client = Arc::new(FakeStarknetClient::new(0, 0));
		let handler = handler(client.clone());
		let order = order(
			ORIGIN_CHAIN,
			STARKNET_DESTINATION,
			&settler(),
			vec![(&token(), 100), ("", 3)],
		);
		let instruction = &order.resolved_order.fill_instructions[0];

		assert_eq!(handler.fill(&order, instruction).await.unwrap(), OrderAction::Settle);
		// Second fill sees FILLED and submits nothing
		assert_eq!(handler.fill(&order, instruction).await.unwrap(), OrderAction::Settle);

		let executed = client.executed.lock().unwrap();
		assert_eq!(executed.len(), 1);
		let calls = &executed[0];
		assert_eq!(calls.len(), 3);

		let approved: Vec<Felt> = calls[..2].iter().map(|c| c.to).collect();
		assert!(approved.contains(&parse_felt_address(&token()).unwrap()));
		assert!(approved.contains(&native()));
		assert!(calls[..2].iter().all(|c| c.selector == selector("approve")));

		let fill = &calls[2];
		assert_eq!(fill.selector, selector("fill"));
		assert_eq!(fill.to, parse_felt_address(&settler()).unwrap());
		let mut expected = u256_to_felts(U256::from_be_bytes(order.order_id_bytes().0)).to_vec();
		expected.extend(encode_bytes(&instruction.origin_data));
		expected.extend(encode_bytes(&[]));
		assert_eq!(fill.calldata, expected);
	}

	#[tokio::test]
	async fn test_settle_pays_fee_in_native_token() {
		let client = Arc::new(FakeStarknetClient::new(0, 25));
		*client.status.lock().unwrap() = encode_short_string("FILLED").unwrap();
		let handler = handler(client.clone());
		let order = order(ORIGIN_CHAIN, STARKNET_DESTINATION, &settler(), vec![]);

		assert_eq!(
			handler
				.settle(&order, &order.resolved_order.fill_instructions[0])
				.await
				.unwrap(),
			SettleOutcome::Settled
		);

		let executed = client.executed.lock().unwrap();
		let calls = &executed[0];
		assert_eq!(calls[0].to, native());
		assert_eq!(calls[0].selector, selector("approve"));
		let settle = &calls[1];
		assert_eq!(settle.selector, selector("settle"));
		assert_eq!(settle.calldata[0], Felt::from(1u8));
		assert_eq!(&settle.calldata[3..], &u256_to_felts(U256::from(25u8)));
	}

	#[tokio::test]
	async fn test_status_and_balance() {
		let client = Arc::new(FakeStarknetClient::new(0, 0));
		*client.status.lock().unwrap() = encode_short_string("SETTLED").unwrap();
		let handler = handler(client.clone());
		let order = order(ORIGIN_CHAIN, STARKNET_DESTINATION, &settler(), vec![]);
		let instruction = &order.resolved_order.fill_instructions[0];

		assert_eq!(
			handler.order_status(&order, instruction).await.unwrap(),
			OrderStatus::Settled
		);
		assert_eq!(
			handler.settle(&order, instruction).await.unwrap(),
			SettleOutcome::AlreadySettled
		);
		assert_eq!(handler.balance_of("").await.unwrap(), U256::from(9u8));
	}
}
