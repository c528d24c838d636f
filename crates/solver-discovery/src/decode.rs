//! Helpers shared by the chain-specific decoders.

use solver_types::{ChainFamily, NetworkRegistry, ParsedArgs, ResolvedCrossChainOrder};

/// Maps a wire domain onto a chain ID, falling back to the domain itself.
pub(crate) fn resolve_domain(registry: &NetworkRegistry, domain: u32, field: &'static str) -> u64 {
	match registry.chain_id_for_domain(domain) {
		Ok(chain_id) => chain_id,
		Err(_) => {
			tracing::warn!(domain, field, "Unknown domain, using it as the chain id");
			u64::from(domain)
		},
	}
}

/// Family of a chain; unregistered chains are treated as EVM.
pub(crate) fn family_of(registry: &NetworkRegistry, chain_id: u64) -> ChainFamily {
	registry.family(chain_id).unwrap_or(ChainFamily::Evm)
}

pub(crate) fn parsed_args(registry: &NetworkRegistry, order: ResolvedCrossChainOrder) -> ParsedArgs {
	ParsedArgs::new(order, |chain_id| {
		registry.chain_name(chain_id).map(str::to_string)
	})
}

#[cfg(test)]
pub(crate) mod fixtures {
	use solver_types::{NetworkConfig, NetworkRegistry};

	pub(crate) const STARKNET_CHAIN: u64 = 23448591;

	/// Optimism (10/10) plus a Starknet chain whose domain equals its id.
	pub(crate) fn registry() -> NetworkRegistry {
		let network = |name: &str, chain_id: u64, domain_id: u32| NetworkConfig {
			name: name.to_string(),
			chain_id,
			domain_id,
			rpc_url: format!("http://localhost/{}", name),
			settlement_live: true,
			native_token: None,
		};
		NetworkRegistry::new(vec![
			network("optimism", 10, 10),
			network("base", 8453, 8453),
			network("starknet-sepolia", STARKNET_CHAIN, STARKNET_CHAIN as u32),
		])
		.unwrap()
	}
}
