//! Lazily constructed chain handlers, one per destination chain.

use crate::SolverError;
use alloy_primitives::U256;
use async_trait::async_trait;
use solver_delivery::{
	ChainHandler, EvmChainHandler, EvmClientFactory, SettleConfig, StarknetChainHandler,
	StarknetClientFactory,
};
use solver_order::{BalanceSource, RuleError};
use solver_types::{ChainFamily, NetworkRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Builds a handler the first time a chain is used and reuses it afterwards.
pub struct ChainHandlers {
	registry: Arc<NetworkRegistry>,
	evm_clients: Arc<dyn EvmClientFactory>,
	starknet_clients: Arc<dyn StarknetClientFactory>,
	settle: SettleConfig,
	cancel: CancellationToken,
	evm: RwLock<HashMap<u64, Arc<dyn ChainHandler>>>,
	starknet: RwLock<HashMap<u64, Arc<dyn ChainHandler>>>,
}

impl ChainHandlers {
	pub fn new(
		registry: Arc<NetworkRegistry>,
		evm_clients: Arc<dyn EvmClientFactory>,
		starknet_clients: Arc<dyn StarknetClientFactory>,
		settle: SettleConfig,
		cancel: CancellationToken,
	) -> Self {
		Self {
			registry,
			evm_clients,
			starknet_clients,
			settle,
			cancel,
			evm: RwLock::new(HashMap::new()),
			starknet: RwLock::new(HashMap::new()),
		}
	}

	/// Chains absent from the registry are treated as EVM.
	fn family(&self, chain_id: u64) -> ChainFamily {
		self.registry.family(chain_id).unwrap_or(ChainFamily::Evm)
	}

	/// Returns the handler for `chain_id`, constructing it on first use.
	pub async fn get(&self, chain_id: u64) -> Result<Arc<dyn ChainHandler>, SolverError> {
		let family = self.family(chain_id);
		let cache = match family {
			ChainFamily::Evm => &self.evm,
			ChainFamily::Starknet => &self.starknet,
		};

		if let Some(handler) = cache.read().await.get(&chain_id) {
			return Ok(handler.clone());
		}

		let mut handlers = cache.write().await;
		if let Some(handler) = handlers.get(&chain_id) {
			return Ok(handler.clone());
		}

		let handler: Arc<dyn ChainHandler> = match family {
			ChainFamily::Evm => Arc::new(EvmChainHandler::new(
				self.evm_clients.create(chain_id)?,
				self.registry.clone(),
				self.settle.clone(),
				self.cancel.clone(),
			)),
			ChainFamily::Starknet => Arc::new(StarknetChainHandler::new(
				self.starknet_clients.create(chain_id)?,
				self.registry.clone(),
				self.settle.clone(),
				self.cancel.clone(),
			)),
		};
		tracing::debug!(chain_id, %family, "Created chain handler");
		handlers.insert(chain_id, handler.clone());
		Ok(handler)
	}
}

#[async_trait]
impl BalanceSource for ChainHandlers {
	async fn balance_of(&self, chain_id: u64, token: &str) -> Result<U256, RuleError> {
		let handler = self
			.get(chain_id)
			.await
			.map_err(|e| RuleError::Query(e.to_string()))?;
		handler
			.balance_of(token)
			.await
			.map_err(|e| RuleError::Query(e.to_string()))
	}
}
