//! Builder pattern for constructing solver engines.
//!
//! Storage, account and price feed backends are chosen by name from
//! configuration and created through factory functions. Chain clients are
//! alloy providers for EVM chains and JSON-RPC clients for Starknet chains,
//! whose accounts are injected by the caller.

use crate::engine::SolverEngine;
use crate::handlers::{ChainHandlers, OrderOrchestrator};
use crate::SolverError;
use solver_account::{AccountFactory, AccountService};
use solver_config::Config;
use solver_delivery::{
	AlloyClientFactory, EvmClientFactory, SettleConfig, StarknetAccount, StarknetClientFactory,
	StarknetRpcClientFactory,
};
use solver_discovery::DiscoveryService;
use solver_order::{RuleContext, RulesEngine};
use solver_price::{PriceFeedFactory, PriceFeedInterface, PriceFeedService};
use solver_storage::{ProgressStore, StorageFactory, StorageService};
use solver_types::init_registry;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Factory functions for every pluggable backend, keyed by implementation name.
#[derive(Default)]
pub struct SolverFactories {
	pub storage_factories: HashMap<String, StorageFactory>,
	pub account_factories: HashMap<String, AccountFactory>,
	pub price_factories: HashMap<String, PriceFeedFactory>,
}

/// Builder for constructing a SolverEngine with pluggable implementations.
pub struct SolverBuilder {
	config: Config,
	starknet_accounts: HashMap<u64, Arc<dyn StarknetAccount>>,
	evm_clients: Option<Arc<dyn EvmClientFactory>>,
	starknet_clients: Option<Arc<dyn StarknetClientFactory>>,
}

/// Creates the configured implementations of one component, logging each.
fn create_all<T, E: Display>(
	component: &str,
	primary: &str,
	configs: &HashMap<String, toml::Value>,
	factories: &HashMap<String, fn(&toml::Value) -> Result<T, E>>,
) -> Result<HashMap<String, T>, SolverError> {
	let mut created = HashMap::new();
	for (name, config) in configs {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let enabled = name == primary;
				tracing::info!(component, implementation = %name, enabled, "Loaded");
				created.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(component, implementation = %name, error = %e, "Failed to create implementation");
				return Err(SolverError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}
	Ok(created)
}

fn take_primary<T>(
	component: &str,
	primary: &str,
	mut created: HashMap<String, T>,
) -> Result<T, SolverError> {
	created.remove(primary).ok_or_else(|| {
		SolverError::Config(format!(
			"Primary {} '{}' failed to load or has invalid configuration",
			component, primary
		))
	})
}

impl SolverBuilder {
	/// Creates a new SolverBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			starknet_accounts: HashMap::new(),
			evm_clients: None,
			starknet_clients: None,
		}
	}

	/// Account used to submit transactions on a Starknet chain.
	pub fn with_starknet_account(mut self, chain_id: u64, account: Arc<dyn StarknetAccount>) -> Self {
		self.starknet_accounts.insert(chain_id, account);
		self
	}

	/// Replaces the alloy-based EVM client factory.
	pub fn with_evm_clients(mut self, factory: Arc<dyn EvmClientFactory>) -> Self {
		self.evm_clients = Some(factory);
		self
	}

	/// Replaces the JSON-RPC Starknet client factory.
	pub fn with_starknet_clients(mut self, factory: Arc<dyn StarknetClientFactory>) -> Self {
		self.starknet_clients = Some(factory);
		self
	}

	/// Builds the SolverEngine. Also initializes the process-wide network registry.
	pub async fn build(self, factories: SolverFactories) -> Result<SolverEngine, SolverError> {
		let config = self.config;
		let registry = init_registry(config.build_registry()?);
		tracing::info!(networks = registry.len(), "Network registry initialized");

		let storage = create_all(
			"storage",
			&config.storage.primary,
			&config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage = take_primary("storage", &config.storage.primary, storage)?;
		let progress: Arc<dyn ProgressStore> = Arc::new(StorageService::new(storage));

		let accounts = create_all(
			"account",
			&config.account.primary,
			&config.account.implementations,
			&factories.account_factories,
		)?;
		let account = AccountService::new(take_primary("account", &config.account.primary, accounts)?);
		let solver_address = account.get_address().await?;
		tracing::info!(address = %solver_address, "Solver account loaded");

		let prices = match &config.pricing {
			Some(pricing) => {
				let feeds = create_all(
					"pricing",
					&pricing.primary,
					&pricing.implementations,
					&factories.price_factories,
				)?
				.into_iter()
				.map(|(name, feed)| (name, Arc::<dyn PriceFeedInterface>::from(feed)))
				.collect();
				Some(Arc::new(PriceFeedService::new(feeds, pricing.primary.clone())?))
			},
			None => None,
		};

		let cancel = CancellationToken::new();
		let evm_clients = match self.evm_clients {
			Some(factory) => factory,
			None => Arc::new(AlloyClientFactory::new(registry.clone(), account.signer())),
		};
		let starknet_clients = match self.starknet_clients {
			Some(factory) => factory,
			None => Arc::new(StarknetRpcClientFactory::new(
				registry.clone(),
				self.starknet_accounts,
				cancel.clone(),
			)),
		};

		let settle = SettleConfig {
			max_attempts: config.solver.settle_max_attempts,
			initial_backoff: config.solver.settle_initial_backoff(),
			fork_mode: config.solver.fork_mode,
		};
		let handlers = Arc::new(ChainHandlers::new(
			registry.clone(),
			evm_clients,
			starknet_clients,
			settle,
			cancel.clone(),
		));

		let rules = RulesEngine::from_config(
			&config.rules,
			RuleContext {
				balances: handlers.clone(),
				prices,
				min_profit_bps: config.rules.min_profit_bps,
			},
		)?;

		let orchestrator = Arc::new(OrderOrchestrator::new(
			config.allow_block_lists.clone(),
			Arc::new(rules),
			handlers,
			config.solver.settle_grace_period(),
			cancel.clone(),
		));

		let discovery = DiscoveryService::new(
			config.listeners.clone(),
			registry,
			progress,
			orchestrator.clone(),
		);

		Ok(SolverEngine::new(config, discovery, orchestrator, cancel))
	}
}
