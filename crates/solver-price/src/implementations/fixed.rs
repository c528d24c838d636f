//! Price feed backed by a table in configuration.
//!
//! ```toml
//! [pricing.implementations.fixed]
//! tokens = [
//!   { chain_id = 10, address = "", symbol = "ETH", decimals = 18, price_usd = "3000" },
//! ]
//! ```

use crate::{
	parse_micro_usd, PriceFeedError, PriceFeedFactory, PriceFeedInterface, PriceFeedRegistry,
	PriceRequest, TokenPrice,
};
use async_trait::async_trait;
use serde::Deserialize;
use solver_types::utils::parse_bytes32;
use solver_types::ImplementationRegistry;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
struct TokenEntry {
	chain_id: u64,
	#[serde(default)]
	address: String,
	symbol: String,
	decimals: u8,
	price_usd: String,
}

#[derive(Debug, Default, Deserialize)]
struct FixedPriceConfig {
	#[serde(default)]
	tokens: Vec<TokenEntry>,
}

/// Static USD prices keyed by chain and canonical token address.
pub struct FixedPriceFeed {
	prices: HashMap<(u64, [u8; 32]), TokenPrice>,
}

impl FixedPriceFeed {
	pub fn new(prices: Vec<TokenPrice>) -> Result<Self, PriceFeedError> {
		let mut table = HashMap::new();
		for price in prices {
			// Rejects malformed prices at startup rather than per order
			parse_micro_usd(&price.price_usd)?;
			let key = (price.chain_id, token_key(&price.token_address)?);
			table.insert(key, price);
		}
		Ok(Self { prices: table })
	}
}

fn token_key(address: &str) -> Result<[u8; 32], PriceFeedError> {
	parse_bytes32(address).map_err(|e| PriceFeedError::Configuration(e.to_string()))
}

#[async_trait]
impl PriceFeedInterface for FixedPriceFeed {
	async fn get_token_price(&self, request: &PriceRequest) -> Result<TokenPrice, PriceFeedError> {
		let unsupported =
			|| PriceFeedError::TokenNotSupported(request.token_address.clone(), request.chain_id);
		let key = token_key(&request.token_address).map_err(|_| unsupported())?;
		self.prices
			.get(&(request.chain_id, key))
			.cloned()
			.ok_or_else(unsupported)
	}
}

/// Factory function to create a fixed price feed from configuration.
pub fn create_price_feed(
	config: &toml::Value,
) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError> {
	let parsed: FixedPriceConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| PriceFeedError::Configuration(e.message().to_string()))?;

	let prices = parsed
		.tokens
		.into_iter()
		.map(|entry| TokenPrice {
			token_address: entry.address,
			chain_id: entry.chain_id,
			symbol: entry.symbol,
			price_usd: entry.price_usd,
			decimals: entry.decimals,
			source: Registry::NAME.to_string(),
		})
		.collect();

	let feed = FixedPriceFeed::new(prices)?;
	tracing::debug!(tokens = feed.prices.len(), "Loaded fixed price table");
	Ok(Box::new(feed))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "fixed";
	type Factory = PriceFeedFactory;

	fn factory() -> Self::Factory {
		create_price_feed
	}
}

impl PriceFeedRegistry for Registry {}
