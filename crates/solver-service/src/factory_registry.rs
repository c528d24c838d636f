//! Registry of backend factories known to the binary.
//!
//! Each backend crate lists its implementations through
//! `get_all_implementations()`. Configuration may only name implementations
//! found here.

use solver_account::AccountFactory;
use solver_config::Config;
use solver_core::{SolverBuilder, SolverEngine, SolverFactories};
use solver_price::PriceFeedFactory;
use solver_storage::StorageFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
	pub account: HashMap<String, AccountFactory>,
	pub pricing: HashMap<String, PriceFeedFactory>,
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Returns the process-wide registry, filling it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry {
			storage: HashMap::new(),
			account: HashMap::new(),
			pricing: HashMap::new(),
		};

		for (name, factory) in solver_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.storage.insert(name.to_string(), factory);
		}
		for (name, factory) in solver_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			registry.account.insert(name.to_string(), factory);
		}
		for (name, factory) in solver_price::get_all_implementations() {
			tracing::debug!("Registering pricing implementation: {}", name);
			registry.pricing.insert(name.to_string(), factory);
		}

		registry
	})
}

/// Picks the factories named under `implementations`, failing on unknown names.
fn select<F: Copy>(
	kind: &str,
	available: &HashMap<String, F>,
	configured: &HashMap<String, toml::Value>,
) -> Result<HashMap<String, F>, String> {
	let mut selected = HashMap::new();
	for name in configured.keys() {
		let Some(factory) = available.get(name) else {
			let mut known: Vec<_> = available.keys().cloned().collect();
			known.sort();
			return Err(format!(
				"Unknown {} implementation '{}'. Available: [{}]",
				kind,
				name,
				known.join(", ")
			));
		};
		selected.insert(name.clone(), *factory);
	}
	Ok(selected)
}

pub fn factories_for(config: &Config) -> Result<SolverFactories, String> {
	let registry = get_registry();
	let price_factories = match &config.pricing {
		Some(pricing) => select("pricing", &registry.pricing, &pricing.implementations)?,
		None => HashMap::new(),
	};
	Ok(SolverFactories {
		storage_factories: select("storage", &registry.storage, &config.storage.implementations)?,
		account_factories: select("account", &registry.account, &config.account.implementations)?,
		price_factories,
	})
}

/// Builds the solver from configuration using the registered backends.
pub async fn build_solver_from_config(
	config: Config,
) -> Result<SolverEngine, Box<dyn std::error::Error>> {
	let factories = factories_for(&config)?;
	Ok(SolverBuilder::new(config).build(factories).await?)
}
