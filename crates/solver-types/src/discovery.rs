//! Discovery types shared by configuration and the chain listeners.

use serde::{Deserialize, Serialize};

fn default_poll_interval_secs() -> u64 {
	5
}

fn default_max_block_range() -> u64 {
	1000
}

/// Settings for one chain listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
	/// Network name as configured under `[networks.<name>]`.
	pub chain_name: String,
	/// Origin settler contract emitting `Open` events.
	pub contract_address: String,
	/// Positive: absolute block. Zero: chain tip at startup. Negative `-K`:
	/// `K` blocks behind the tip.
	#[serde(default)]
	pub start_block: i64,
	#[serde(default = "default_poll_interval_secs")]
	pub poll_interval_secs: u64,
	/// Trailing blocks withheld from processing.
	#[serde(default)]
	pub confirmation_blocks: u64,
	/// Largest block span requested from the node in one query.
	#[serde(default = "default_max_block_range")]
	pub max_block_range: u64,
}
