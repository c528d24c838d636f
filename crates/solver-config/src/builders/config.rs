//! Configuration builder for tests and local development.

use crate::{AccountConfig, Config, NetworkSection, RulesConfig, SolverConfig, StorageConfig};
use solver_types::{AllowBlockListItem, AllowBlockLists, ListenerConfig};
use std::collections::{BTreeMap, HashMap};

/// Fluent builder producing a valid [`Config`] with in-memory storage.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	solver_id: String,
	fork_mode: bool,
	settle_grace_period_secs: u64,
	networks: BTreeMap<String, NetworkSection>,
	listeners: Vec<ListenerConfig>,
	lists: AllowBlockLists,
	rules: RulesConfig,
	private_key: Option<String>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			solver_id: "test-solver".to_string(),
			fork_mode: false,
			settle_grace_period_secs: 0,
			networks: BTreeMap::new(),
			listeners: Vec::new(),
			lists: AllowBlockLists::default(),
			rules: RulesConfig::default(),
			private_key: None,
		}
	}

	pub fn fork_mode(mut self, fork_mode: bool) -> Self {
		self.fork_mode = fork_mode;
		self
	}

	pub fn settle_grace_period_secs(mut self, secs: u64) -> Self {
		self.settle_grace_period_secs = secs;
		self
	}

	/// Adds a network whose domain equals its chain ID.
	pub fn network(mut self, name: &str, chain_id: u64) -> Self {
		self.networks.insert(
			name.to_string(),
			NetworkSection {
				chain_id,
				domain_id: chain_id as u32,
				rpc_url: format!("http://localhost/{}", name),
				settlement_live: true,
				native_token: None,
			},
		);
		self
	}

	pub fn listener(mut self, chain_name: &str, contract_address: &str) -> Self {
		self.listeners.push(ListenerConfig {
			chain_name: chain_name.to_string(),
			contract_address: contract_address.to_string(),
			start_block: 0,
			poll_interval_secs: 1,
			confirmation_blocks: 0,
			max_block_range: 100,
		});
		self
	}

	pub fn allow(mut self, sender: &str, domain: &str, recipient: &str) -> Self {
		self.lists.allow_list.push(item(sender, domain, recipient));
		self
	}

	pub fn block(mut self, sender: &str, domain: &str, recipient: &str) -> Self {
		self.lists.block_list.push(item(sender, domain, recipient));
		self
	}

	pub fn rules(mut self, enabled: &[&str], min_profit_bps: u32) -> Self {
		self.rules = RulesConfig {
			enabled: enabled.iter().map(|s| s.to_string()).collect(),
			min_profit_bps,
		};
		self
	}

	/// Key for the `local` account.
	pub fn private_key(mut self, key: &str) -> Self {
		self.private_key = Some(key.to_string());
		self
	}

	pub fn build(self) -> Config {
		let mut storage_impls = HashMap::new();
		storage_impls.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);
		let mut local = toml::map::Map::new();
		if let Some(key) = self.private_key {
			local.insert("private_key".to_string(), toml::Value::String(key));
		}
		let mut account_impls = HashMap::new();
		account_impls.insert("local".to_string(), toml::Value::Table(local));

		Config {
			solver: SolverConfig {
				id: self.solver_id,
				fork_mode: self.fork_mode,
				settle_grace_period_secs: self.settle_grace_period_secs,
				settle_max_attempts: 3,
				settle_initial_backoff_ms: 10,
			},
			networks: self.networks,
			listeners: self.listeners,
			allow_block_lists: self.lists,
			rules: self.rules,
			storage: StorageConfig {
				primary: "memory".to_string(),
				implementations: storage_impls,
			},
			account: AccountConfig {
				primary: "local".to_string(),
				implementations: account_impls,
			},
			pricing: None,
		}
	}
}

fn item(sender: &str, domain: &str, recipient: &str) -> AllowBlockListItem {
	AllowBlockListItem {
		sender_address: sender.to_string(),
		destination_domain: domain.to_string(),
		recipient_address: recipient.to_string(),
	}
}
