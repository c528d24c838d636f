//! Alloy-based EVM chain client.
//!
//! One provider per chain, each carrying the solver's signer through an
//! [`EthereumWallet`] so transactions are filled, signed and sent by alloy.

use super::handler::{EvmCall, EvmChainClient, EvmClientFactory};
use crate::{DeliveryError, TxOutcome};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_transport_http::Http;
use async_trait::async_trait;
use solver_types::NetworkRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Receipt polling interval used by pending transactions.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// [`EvmChainClient`] backed by an alloy HTTP provider.
pub struct AlloyEvmClient {
	chain_id: u64,
	signer_address: Address,
	provider: Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
}

impl AlloyEvmClient {
	pub fn new(
		chain_id: u64,
		rpc_url: &str,
		signer: PrivateKeySigner,
	) -> Result<Self, DeliveryError> {
		let url = rpc_url.parse().map_err(|e| {
			DeliveryError::Configuration(format!("Invalid RPC URL for chain {}: {}", chain_id, e))
		})?;

		let signer = signer.with_chain_id(Some(chain_id));
		let signer_address = signer.address();
		let provider = ProviderBuilder::new()
			.with_recommended_fillers()
			.wallet(EthereumWallet::from(signer))
			.on_http(url);
		provider.client().set_poll_interval(RECEIPT_POLL_INTERVAL);

		Ok(Self {
			chain_id,
			signer_address,
			provider: Arc::new(provider),
		})
	}
}

#[async_trait]
impl EvmChainClient for AlloyEvmClient {
	fn chain_id(&self) -> u64 {
		self.chain_id
	}

	fn signer_address(&self) -> Address {
		self.signer_address
	}

	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, DeliveryError> {
		let request = TransactionRequest::default().to(to).input(data.into());
		self.provider.call(&request).await.map_err(|e| {
			DeliveryError::Network(format!("Call to {} on chain {} failed: {}", to, self.chain_id, e))
		})
	}

	async fn native_balance(&self, owner: Address) -> Result<U256, DeliveryError> {
		self.provider
			.get_balance(owner)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn send(&self, call: EvmCall) -> Result<TxOutcome, DeliveryError> {
		let request = TransactionRequest::default()
			.to(call.to)
			.input(call.data.into())
			.value(call.value);

		let pending = self
			.provider
			.send_transaction(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;
		let hash = format!("{}", pending.tx_hash());
		tracing::info!(tx_hash = %hash, chain_id = self.chain_id, "Submitted transaction");

		let receipt = pending.get_receipt().await.map_err(|e| {
			DeliveryError::Network(format!("Failed to get receipt for {}: {}", hash, e))
		})?;

		Ok(TxOutcome {
			hash,
			success: receipt.status(),
		})
	}
}

/// Builds [`AlloyEvmClient`]s from the network registry with one signer.
pub struct AlloyClientFactory {
	registry: Arc<NetworkRegistry>,
	signer: PrivateKeySigner,
}

impl AlloyClientFactory {
	pub fn new(registry: Arc<NetworkRegistry>, signer: PrivateKeySigner) -> Self {
		Self { registry, signer }
	}
}

impl EvmClientFactory for AlloyClientFactory {
	fn create(&self, chain_id: u64) -> Result<Arc<dyn EvmChainClient>, DeliveryError> {
		let network = self.registry.by_chain_id(chain_id).ok_or_else(|| {
			DeliveryError::Configuration(format!("Network {} not found in configuration", chain_id))
		})?;
		let client = AlloyEvmClient::new(chain_id, &network.rpc_url, self.signer.clone())?;
		tracing::debug!(chain = %network.name, chain_id, "Created EVM client");
		Ok(Arc::new(client))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::registry;

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_factory_binds_signer_and_rejects_unknown_chain() {
		let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
		let factory = AlloyClientFactory::new(Arc::new(registry()), signer.clone());

		let client = factory.create(10).unwrap();
		assert_eq!(client.chain_id(), 10);
		assert_eq!(client.signer_address(), signer.address());

		assert!(matches!(
			factory.create(999),
			Err(DeliveryError::Configuration(_))
		));
	}
}
