//! Configuration module for the cross-chain solver.
//!
//! Loads the solver configuration from TOML, resolving `${VAR}` and
//! `${VAR:-default}` environment references before parsing, and validates the
//! cross-references between sections (listeners to networks, primaries to
//! implementations, unique chain and domain IDs).
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["networks.toml", "listeners.toml"]` in the main file
//! - Each top-level section must be unique across all files

mod loader;

#[cfg(feature = "testing")]
pub mod builders {
	pub mod config;
}

use regex::Regex;
use serde::{Deserialize, Serialize};
use solver_types::{
	AllowBlockLists, ListenerConfig, NetworkConfig, NetworkRegistry, RegistryError,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

impl From<RegistryError> for ConfigError {
	fn from(err: RegistryError) -> Self {
		ConfigError::Validation(err.to_string())
	}
}

/// Top-level solver configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub solver: SolverConfig,
	/// Networks keyed by chain name.
	pub networks: BTreeMap<String, NetworkSection>,
	#[serde(default)]
	pub listeners: Vec<ListenerConfig>,
	#[serde(default)]
	pub allow_block_lists: AllowBlockLists,
	#[serde(default)]
	pub rules: RulesConfig,
	pub storage: StorageConfig,
	pub account: AccountConfig,
	#[serde(default)]
	pub pricing: Option<PricingConfig>,
}

/// Configuration specific to the solver instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Treats every settlement route as live. Used against forked chains.
	#[serde(default)]
	pub fork_mode: bool,
	/// Pause between the last fill and the first settle call.
	#[serde(default = "default_settle_grace_period_secs")]
	pub settle_grace_period_secs: u64,
	/// Status polls before settlement gives up on seeing the fill.
	#[serde(default = "default_settle_max_attempts")]
	pub settle_max_attempts: u32,
	/// First delay between settlement status polls; doubles each retry.
	#[serde(default = "default_settle_initial_backoff_ms")]
	pub settle_initial_backoff_ms: u64,
}

fn default_settle_grace_period_secs() -> u64 {
	5
}

fn default_settle_max_attempts() -> u32 {
	5
}

fn default_settle_initial_backoff_ms() -> u64 {
	1000
}

impl SolverConfig {
	pub fn settle_grace_period(&self) -> Duration {
		Duration::from_secs(self.settle_grace_period_secs)
	}

	pub fn settle_initial_backoff(&self) -> Duration {
		Duration::from_millis(self.settle_initial_backoff_ms)
	}
}

fn default_settlement_live() -> bool {
	true
}

/// A `[networks.<name>]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkSection {
	pub chain_id: u64,
	pub domain_id: u32,
	pub rpc_url: String,
	#[serde(default = "default_settlement_live")]
	pub settlement_live: bool,
	#[serde(default)]
	pub native_token: Option<String>,
}

/// Ordered rule names and their parameters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RulesConfig {
	/// Rule names, evaluated in this order.
	#[serde(default)]
	pub enabled: Vec<String>,
	/// Minimum margin over spent value, in basis points, for `profitability`.
	#[serde(default)]
	pub min_profit_bps: u32,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for the token price source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of `VAR_NAME`, or with `default`
/// for `${VAR_NAME:-default}` when the variable is unset.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)))
			},
		};
		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Network entries with their names filled in.
	pub fn network_configs(&self) -> Vec<NetworkConfig> {
		self.networks
			.iter()
			.map(|(name, section)| NetworkConfig {
				name: name.clone(),
				chain_id: section.chain_id,
				domain_id: section.domain_id,
				rpc_url: section.rpc_url.clone(),
				settlement_live: section.settlement_live,
				native_token: section.native_token.clone(),
			})
			.collect()
	}

	/// Builds the network registry described by `[networks]`.
	pub fn build_registry(&self) -> Result<NetworkRegistry, ConfigError> {
		Ok(NetworkRegistry::new(self.network_configs())?)
	}

	/// Checks cross-section consistency.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.solver.id.is_empty() {
			return Err(ConfigError::Validation("Solver ID cannot be empty".into()));
		}
		if self.solver.settle_max_attempts == 0 {
			return Err(ConfigError::Validation(
				"settle_max_attempts must be at least 1".into(),
			));
		}

		if self.networks.is_empty() {
			return Err(ConfigError::Validation(
				"Networks configuration cannot be empty".into(),
			));
		}
		for (name, network) in &self.networks {
			if network.rpc_url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network '{}' must have an rpc_url",
					name
				)));
			}
		}
		// Duplicate chain and domain IDs
		self.build_registry()?;

		let mut listened = HashSet::new();
		for listener in &self.listeners {
			if !self.networks.contains_key(&listener.chain_name) {
				return Err(ConfigError::Validation(format!(
					"Listener references unknown network '{}'",
					listener.chain_name
				)));
			}
			if !listened.insert(listener.chain_name.as_str()) {
				return Err(ConfigError::Validation(format!(
					"Multiple listeners configured for network '{}'",
					listener.chain_name
				)));
			}
			if listener.contract_address.is_empty() {
				return Err(ConfigError::Validation(format!(
					"Listener for '{}' must have a contract_address",
					listener.chain_name
				)));
			}
			if listener.max_block_range == 0 {
				return Err(ConfigError::Validation(format!(
					"Listener for '{}' must have max_block_range >= 1",
					listener.chain_name
				)));
			}
			if listener.poll_interval_secs == 0 {
				return Err(ConfigError::Validation(format!(
					"Listener for '{}' must have poll_interval_secs >= 1",
					listener.chain_name
				)));
			}
		}

		for item in self
			.allow_block_lists
			.allow_list
			.iter()
			.chain(&self.allow_block_lists.block_list)
		{
			if item.sender_address.is_empty()
				|| item.destination_domain.is_empty()
				|| item.recipient_address.is_empty()
			{
				return Err(ConfigError::Validation(
					"Allow/block list fields must be an address, a chain name or \"*\"".into(),
				));
			}
		}

		validate_primary("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_primary("account", &self.account.primary, &self.account.implementations)?;
		if let Some(pricing) = &self.pricing {
			validate_primary("pricing", &pricing.primary, &pricing.implementations)?;
		}

		Ok(())
	}
}

fn validate_primary(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

/// Parses a TOML string: environment references are resolved first and the
/// result is validated.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) const BASE_CONFIG: &str = r#"
[solver]
id = "test-solver"

[networks.optimism]
chain_id = 10
domain_id = 10
rpc_url = "http://localhost:8545"

[networks.starknet]
chain_id = 23448594
domain_id = 23448594
rpc_url = "http://localhost:5050"
native_token = "0x049d36570d4e46f48e99674bd3fcc84644ddd6b96f7c741b1562b82f9e004dc7"
settlement_live = false

[[listeners]]
chain_name = "optimism"
contract_address = "0x1234567890123456789012345678901234567890"
start_block = -50
confirmation_blocks = 2

[allow_block_lists]
block_list = [{ sender_address = "0xAAA", destination_domain = "*", recipient_address = "*" }]

[rules]
enabled = ["balance", "profitability"]
min_profit_bps = 25

[storage]
primary = "memory"
[storage.implementations.memory]

[account]
primary = "local"
[account.implementations.local]
private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SOLVER_CFG_TEST_HOST", "localhost");
		std::env::set_var("SOLVER_CFG_TEST_PORT", "5432");

		let input = "host = \"${SOLVER_CFG_TEST_HOST}:${SOLVER_CFG_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "host = \"localhost:5432\"");

		std::env::remove_var("SOLVER_CFG_TEST_HOST");
		std::env::remove_var("SOLVER_CFG_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${SOLVER_CFG_MISSING:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");

		let err = resolve_env_vars("value = \"${SOLVER_CFG_MISSING}\"").unwrap_err();
		assert!(err.to_string().contains("SOLVER_CFG_MISSING"));
	}

	#[test]
	fn test_parse_full_config() {
		let config: Config = BASE_CONFIG.parse().unwrap();
		assert_eq!(config.solver.id, "test-solver");
		assert_eq!(config.solver.settle_grace_period(), Duration::from_secs(5));
		assert_eq!(config.solver.settle_max_attempts, 5);
		assert!(!config.solver.fork_mode);

		let listener = &config.listeners[0];
		assert_eq!(listener.start_block, -50);
		assert_eq!(listener.poll_interval_secs, 5);
		assert_eq!(listener.max_block_range, 1000);

		assert_eq!(config.allow_block_lists.block_list.len(), 1);
		assert!(config.allow_block_lists.allow_list.is_empty());
		assert_eq!(config.rules.enabled, vec!["balance", "profitability"]);

		let registry = config.build_registry().unwrap();
		let starknet = registry.by_name("starknet").unwrap();
		assert!(!starknet.settlement_live);
		assert!(starknet.native_token.is_some());
		assert!(registry.by_name("optimism").unwrap().settlement_live);
	}

	#[test]
	fn test_listener_must_reference_network() {
		let config = BASE_CONFIG.replace(
			"chain_name = \"optimism\"",
			"chain_name = \"arbitrum\"",
		);
		let err = config.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("unknown network 'arbitrum'"));
	}

	#[test]
	fn test_duplicate_domain_rejected() {
		let config = BASE_CONFIG.replace("domain_id = 23448594", "domain_id = 10");
		let err = config.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Duplicate domain id 10"));
	}

	#[test]
	fn test_zero_block_range_rejected() {
		let config = BASE_CONFIG.replace(
			"confirmation_blocks = 2",
			"confirmation_blocks = 2\nmax_block_range = 0",
		);
		assert!(config.parse::<Config>().is_err());
	}

	#[test]
	fn test_missing_storage_primary_rejected() {
		let config = BASE_CONFIG.replace("primary = \"memory\"", "primary = \"file\"");
		let err = config.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("Primary storage 'file'"));
	}
}
