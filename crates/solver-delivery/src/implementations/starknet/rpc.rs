//! Starknet JSON-RPC client.
//!
//! Reads go straight to the node through `starknet_call`. Writes are signed
//! and submitted by an injected [`StarknetAccount`]; this client only waits
//! for the receipt.

use super::handler::{StarknetAccount, StarknetCall, StarknetChainClient, StarknetClientFactory};
use crate::backoff::sleep_or_cancel;
use crate::{DeliveryError, TxOutcome};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use solver_types::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use solver_types::standards::starknet::selector;
use solver_types::standards::{felt_from_hex, felt_to_hex, Felt};
use solver_types::NetworkRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Node error code for a hash the node has not seen yet.
const TXN_HASH_NOT_FOUND: &str = "RPC error 29:";

#[derive(Debug, Serialize)]
struct FunctionCall {
	contract_address: String,
	entry_point_selector: String,
	calldata: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Receipt {
	#[serde(default)]
	execution_status: Option<String>,
	#[serde(default)]
	revert_reason: Option<String>,
}

/// [`StarknetChainClient`] over plain JSON-RPC with an injected account.
pub struct StarknetRpcClient {
	chain_id: u64,
	rpc_url: String,
	http: reqwest::Client,
	account: Arc<dyn StarknetAccount>,
	receipt_poll_interval: Duration,
	receipt_max_polls: u32,
	cancel: CancellationToken,
}

impl StarknetRpcClient {
	pub fn new(
		chain_id: u64,
		rpc_url: &str,
		account: Arc<dyn StarknetAccount>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			chain_id,
			rpc_url: rpc_url.to_string(),
			http: reqwest::Client::new(),
			account,
			receipt_poll_interval: Duration::from_secs(2),
			receipt_max_polls: 90,
			cancel,
		}
	}

	async fn request<P: Serialize, T: DeserializeOwned>(
		&self,
		method: &str,
		params: P,
	) -> Result<T, DeliveryError> {
		let response: JsonRpcResponse<T> = self
			.http
			.post(&self.rpc_url)
			.json(&JsonRpcRequest::new(method, params))
			.send()
			.await
			.map_err(|e| DeliveryError::Network(format!("{} failed: {}", method, e)))?
			.json()
			.await
			.map_err(|e| DeliveryError::Network(format!("{} bad response: {}", method, e)))?;
		response
			.into_result()
			.map_err(|e| DeliveryError::Network(format!("{}: {}", method, e)))
	}

	async fn wait_for_receipt(&self, hash: &str) -> Result<Receipt, DeliveryError> {
		for _ in 0..self.receipt_max_polls {
			match self
				.request::<_, Receipt>(
					"starknet_getTransactionReceipt",
					serde_json::json!({ "transaction_hash": hash }),
				)
				.await
			{
				Ok(receipt) if receipt.execution_status.is_some() => return Ok(receipt),
				Ok(_) => {},
				Err(DeliveryError::Network(e)) if e.contains(TXN_HASH_NOT_FOUND) => {},
				Err(e) => return Err(e),
			}
			sleep_or_cancel(self.receipt_poll_interval, &self.cancel).await?;
		}
		Err(DeliveryError::Network(format!(
			"No receipt for {} after {} polls",
			hash, self.receipt_max_polls
		)))
	}
}

fn parse_result(values: &[String]) -> Result<Vec<Felt>, DeliveryError> {
	values
		.iter()
		.map(|v| felt_from_hex(v).map_err(|e| DeliveryError::Network(e.to_string())))
		.collect()
}

fn receipt_outcome(hash: String, receipt: Receipt) -> TxOutcome {
	let success = receipt.execution_status.as_deref() == Some("SUCCEEDED");
	if let Some(reason) = receipt.revert_reason.filter(|_| !success) {
		tracing::warn!(tx_hash = %hash, %reason, "Starknet transaction reverted");
	}
	TxOutcome { hash, success }
}

#[async_trait]
impl StarknetChainClient for StarknetRpcClient {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	fn account_address(&self) -> Felt {
		self.account.address()
	}

	async fn call(
		&self,
		contract: Felt,
		entrypoint: &str,
		calldata: Vec<Felt>,
	) -> Result<Vec<Felt>, DeliveryError> {
		let request = FunctionCall {
			contract_address: felt_to_hex(contract),
			entry_point_selector: felt_to_hex(selector(entrypoint)),
			calldata: calldata.into_iter().map(felt_to_hex).collect(),
		};
		let result: Vec<String> = self
			.request(
				"starknet_call",
				serde_json::json!({ "request": request, "block_id": "latest" }),
			)
			.await?;
		parse_result(&result)
	}

	async fn execute(&self, calls: Vec<StarknetCall>) -> Result<TxOutcome, DeliveryError> {
		let hash = felt_to_hex(self.account.execute(calls).await?);
		tracing::info!(tx_hash = %hash, chain_id = self.chain_id, "Submitted Starknet transaction");
		let receipt = self.wait_for_receipt(&hash).await?;
		Ok(receipt_outcome(hash, receipt))
	}
}

/// Builds [`StarknetRpcClient`]s for chains that have an account configured.
pub struct StarknetRpcClientFactory {
	registry: Arc<NetworkRegistry>,
	accounts: HashMap<u64, Arc<dyn StarknetAccount>>,
	cancel: CancellationToken,
}

impl StarknetRpcClientFactory {
	pub fn new(
		registry: Arc<NetworkRegistry>,
		accounts: HashMap<u64, Arc<dyn StarknetAccount>>,
		cancel: CancellationToken,
	) -> Self {
		Self {
			registry,
			accounts,
			cancel,
		}
	}
}

impl StarknetClientFactory for StarknetRpcClientFactory {
	fn create(&self, chain_id: u64) -> Result<Arc<dyn StarknetChainClient>, DeliveryError> {
		let network = self.registry.by_chain_id(chain_id).ok_or_else(|| {
			DeliveryError::Configuration(format!("Network {} not found in configuration", chain_id))
		})?;
		let account = self.accounts.get(&chain_id).cloned().ok_or_else(|| {
			DeliveryError::Configuration(format!("No Starknet account configured for {}", network.name))
		})?;
		Ok(Arc::new(StarknetRpcClient::new(
			chain_id,
			&network.rpc_url,
			account,
			self.cancel.clone(),
		)))
	}
}
