//! Network registry for multi-chain solver operations.
//!
//! Maps chain names, numeric chain IDs and messaging-protocol domain IDs onto
//! each other. The registry is built once from configuration and installed as
//! process-wide state before any listener or handler starts; components that
//! need it take an explicit `Arc<NetworkRegistry>` so tests can supply their own.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors raised while building or querying the network registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
	/// Two networks share the same chain ID.
	#[error("Duplicate chain id {0}")]
	DuplicateChainId(u64),
	/// Two networks share the same domain ID.
	#[error("Duplicate domain id {0}")]
	DuplicateDomain(u32),
	/// Two networks share the same name.
	#[error("Duplicate network name {0}")]
	DuplicateName(String),
	/// The process-wide registry has not been initialized.
	#[error("Network registry not initialized")]
	NotInitialized,
	/// No network is registered for the chain ID.
	#[error("Unknown chain id {0}")]
	UnknownChain(u64),
	/// No network is registered for the domain ID.
	#[error("Unknown domain {0}")]
	UnknownDomain(u32),
}

fn default_settlement_live() -> bool {
	true
}

/// Configuration for a single blockchain network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
	/// Human readable chain name, also used to key persisted progress.
	pub name: String,
	/// Native chain ID.
	pub chain_id: u64,
	/// Messaging-protocol domain ID.
	pub domain_id: u32,
	/// HTTP(S) JSON-RPC endpoint.
	pub rpc_url: String,
	/// Whether this chain's domain accepts settlement messages yet.
	#[serde(default = "default_settlement_live")]
	pub settlement_live: bool,
	/// Token contract used for native value and messaging fees on chains
	/// without value-carrying calls.
	#[serde(default)]
	pub native_token: Option<String>,
}

/// Virtual machine family of a chain, selecting encoders and handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
	Evm,
	Starknet,
}

impl ChainFamily {
	/// Classifies a chain by its configured name.
	pub fn from_chain_name(name: &str) -> Self {
		if name.to_lowercase().contains("starknet") {
			ChainFamily::Starknet
		} else {
			ChainFamily::Evm
		}
	}
}

impl std::fmt::Display for ChainFamily {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ChainFamily::Evm => write!(f, "evm"),
			ChainFamily::Starknet => write!(f, "starknet"),
		}
	}
}

/// Read-only lookup tables over the configured networks.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
	networks: HashMap<u64, NetworkConfig>,
	by_name: HashMap<String, u64>,
	by_domain: HashMap<u32, u64>,
}

impl NetworkRegistry {
	/// Builds a registry, rejecting duplicate names, chain IDs or domains.
	pub fn new(networks: impl IntoIterator<Item = NetworkConfig>) -> Result<Self, RegistryError> {
		let mut registry = Self::default();
		for network in networks {
			if registry.networks.contains_key(&network.chain_id) {
				return Err(RegistryError::DuplicateChainId(network.chain_id));
			}
			if registry.by_name.contains_key(&network.name) {
				return Err(RegistryError::DuplicateName(network.name));
			}
			if registry.by_domain.contains_key(&network.domain_id) {
				return Err(RegistryError::DuplicateDomain(network.domain_id));
			}
			registry
				.by_name
				.insert(network.name.clone(), network.chain_id);
			registry
				.by_domain
				.insert(network.domain_id, network.chain_id);
			registry.networks.insert(network.chain_id, network);
		}
		Ok(registry)
	}

	pub fn by_chain_id(&self, chain_id: u64) -> Option<&NetworkConfig> {
		self.networks.get(&chain_id)
	}

	pub fn by_name(&self, name: &str) -> Option<&NetworkConfig> {
		self.by_name
			.get(name)
			.and_then(|chain_id| self.networks.get(chain_id))
	}

	pub fn by_domain(&self, domain: u32) -> Option<&NetworkConfig> {
		self.by_domain
			.get(&domain)
			.and_then(|chain_id| self.networks.get(chain_id))
	}

	/// Resolves a messaging domain to its native chain ID.
	pub fn chain_id_for_domain(&self, domain: u32) -> Result<u64, RegistryError> {
		self.by_domain
			.get(&domain)
			.copied()
			.ok_or(RegistryError::UnknownDomain(domain))
	}

	/// Resolves a native chain ID to its messaging domain.
	pub fn domain_for_chain(&self, chain_id: u64) -> Result<u32, RegistryError> {
		self.by_chain_id(chain_id)
			.map(|n| n.domain_id)
			.ok_or(RegistryError::UnknownChain(chain_id))
	}

	pub fn chain_name(&self, chain_id: u64) -> Option<&str> {
		self.by_chain_id(chain_id).map(|n| n.name.as_str())
	}

	/// Classifies a chain ID; unknown chains are an error rather than a guess.
	pub fn family(&self, chain_id: u64) -> Result<ChainFamily, RegistryError> {
		self.chain_name(chain_id)
			.map(ChainFamily::from_chain_name)
			.ok_or(RegistryError::UnknownChain(chain_id))
	}

	pub fn networks(&self) -> impl Iterator<Item = &NetworkConfig> {
		self.networks.values()
	}

	pub fn len(&self) -> usize {
		self.networks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.networks.is_empty()
	}
}

static GLOBAL_REGISTRY: Lazy<RwLock<Option<Arc<NetworkRegistry>>>> =
	Lazy::new(|| RwLock::new(None));

/// Installs the process-wide registry, replacing any previous one.
pub fn init_registry(registry: NetworkRegistry) -> Arc<NetworkRegistry> {
	let registry = Arc::new(registry);
	let mut slot = GLOBAL_REGISTRY
		.write()
		.unwrap_or_else(|poisoned| poisoned.into_inner());
	*slot = Some(registry.clone());
	tracing::debug!(networks = registry.len(), "Network registry initialized");
	registry
}

/// Returns the process-wide registry.
pub fn global_registry() -> Result<Arc<NetworkRegistry>, RegistryError> {
	GLOBAL_REGISTRY
		.read()
		.unwrap_or_else(|poisoned| poisoned.into_inner())
		.clone()
		.ok_or(RegistryError::NotInitialized)
}

/// Clears the process-wide registry. Test harnesses call this between cases.
pub fn reset_registry() {
	let mut slot = GLOBAL_REGISTRY
		.write()
		.unwrap_or_else(|poisoned| poisoned.into_inner());
	*slot = None;
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn network(name: &str, chain_id: u64, domain_id: u32) -> NetworkConfig {
		NetworkConfig {
			name: name.to_string(),
			chain_id,
			domain_id,
			rpc_url: format!("http://localhost/{}", name),
			settlement_live: true,
			native_token: None,
		}
	}

	#[test]
	fn test_lookups() {
		let registry = NetworkRegistry::new(vec![
			network("optimism", 10, 10),
			network("starknet-sepolia", 23448591, 23448591),
		])
		.unwrap();

		assert_eq!(registry.chain_id_for_domain(23448591).unwrap(), 23448591);
		assert_eq!(registry.domain_for_chain(10).unwrap(), 10);
		assert_eq!(registry.chain_name(10), Some("optimism"));
		assert_eq!(registry.family(10).unwrap(), ChainFamily::Evm);
		assert_eq!(
			registry.family(23448591).unwrap(),
			ChainFamily::Starknet
		);
		assert_eq!(registry.family(99), Err(RegistryError::UnknownChain(99)));
		assert_eq!(
			registry.chain_id_for_domain(7),
			Err(RegistryError::UnknownDomain(7))
		);
	}

	#[test]
	fn test_rejects_duplicates() {
		let err = NetworkRegistry::new(vec![network("a", 1, 1), network("b", 1, 2)]).unwrap_err();
		assert_eq!(err, RegistryError::DuplicateChainId(1));

		let err = NetworkRegistry::new(vec![network("a", 1, 1), network("b", 2, 1)]).unwrap_err();
		assert_eq!(err, RegistryError::DuplicateDomain(1));
	}

	#[test]
	fn test_global_registry_reinit() {
		reset_registry();
		assert_eq!(global_registry().unwrap_err(), RegistryError::NotInitialized);

		init_registry(NetworkRegistry::new(vec![network("base", 8453, 8453)]).unwrap());
		assert!(global_registry().unwrap().by_name("base").is_some());

		init_registry(NetworkRegistry::new(vec![network("arbitrum", 42161, 42161)]).unwrap());
		let current = global_registry().unwrap();
		assert!(current.by_name("base").is_none());
		assert!(current.by_name("arbitrum").is_some());

		reset_registry();
		assert!(global_registry().is_err());
	}
}
