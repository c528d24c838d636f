//! Price feed module for the solver.
//!
//! Supplies USD prices for the tokens an order moves so the profitability rule
//! can compare what the solver spends against what it receives.

use alloy_primitives::U256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_types::ImplementationRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod fixed;
}

/// Fixed-point scale of [`TokenPrice::micro_usd`].
pub const MICRO_USD: u64 = 1_000_000;

/// Errors that can occur during price feed operations.
#[derive(Debug, Error)]
pub enum PriceFeedError {
	/// The feed has no price for the token.
	#[error("Token not supported: {0} on chain {1}")]
	TokenNotSupported(String, u64),
	/// A configured or fetched price could not be parsed.
	#[error("Invalid price '{0}'")]
	InvalidPrice(String),
	/// Internal error that occurs during price feed operations.
	#[error("Internal error: {0}")]
	Internal(String),
	/// Error that occurs when configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A token price in USD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrice {
	/// Token address as configured; empty for the native asset.
	pub token_address: String,
	pub chain_id: u64,
	pub symbol: String,
	/// Decimal USD price per whole token, e.g. `"3150.25"`.
	pub price_usd: String,
	pub decimals: u8,
	/// Name of the feed that produced the price.
	pub source: String,
}

impl TokenPrice {
	/// Price per whole token in millionths of a dollar.
	pub fn micro_usd(&self) -> Result<U256, PriceFeedError> {
		parse_micro_usd(&self.price_usd)
	}

	/// USD value of a raw on-chain `amount`, in millionths of a dollar.
	pub fn value_of(&self, amount: U256) -> Result<U256, PriceFeedError> {
		let scale = U256::from(10u8).pow(U256::from(self.decimals));
		amount
			.checked_mul(self.micro_usd()?)
			.map(|v| v / scale)
			.ok_or_else(|| PriceFeedError::Internal(format!("Value overflow for {}", amount)))
	}
}

/// Parses a non-negative decimal string into millionths. Digits beyond the
/// sixth decimal place are truncated.
pub fn parse_micro_usd(price: &str) -> Result<U256, PriceFeedError> {
	let invalid = || PriceFeedError::InvalidPrice(price.to_string());
	let (whole, frac) = price.trim().split_once('.').unwrap_or((price.trim(), ""));
	if whole.is_empty() && frac.is_empty() {
		return Err(invalid());
	}
	if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
		return Err(invalid());
	}
	let whole = if whole.is_empty() {
		U256::ZERO
	} else {
		U256::from_str_radix(whole, 10).map_err(|_| invalid())?
	};
	let mut frac_digits: String = frac.chars().take(6).collect();
	while frac_digits.len() < 6 {
		frac_digits.push('0');
	}
	let frac = U256::from_str_radix(&frac_digits, 10).map_err(|_| invalid())?;
	Ok(whole * U256::from(MICRO_USD) + frac)
}

/// Request structure for fetching token prices.
#[derive(Debug, Clone)]
pub struct PriceRequest {
	/// Empty for the native asset.
	pub token_address: String,
	pub chain_id: u64,
}

/// Interface every price feed implements.
#[async_trait]
pub trait PriceFeedInterface: Send + Sync {
	async fn get_token_price(&self, request: &PriceRequest) -> Result<TokenPrice, PriceFeedError>;
}

/// Type alias for price feed factory functions.
pub type PriceFeedFactory =
	fn(&toml::Value) -> Result<Box<dyn PriceFeedInterface>, PriceFeedError>;

/// Registry trait for price feed implementations.
pub trait PriceFeedRegistry: ImplementationRegistry<Factory = PriceFeedFactory> {}

/// Get all registered price feed implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PriceFeedFactory)> {
	use implementations::fixed;

	vec![(fixed::Registry::NAME, fixed::Registry::factory())]
}

/// Routes price requests to the primary configured feed.
pub struct PriceFeedService {
	implementations: HashMap<String, Arc<dyn PriceFeedInterface>>,
	primary_implementation: String,
}

impl PriceFeedService {
	pub fn new(
		implementations: HashMap<String, Arc<dyn PriceFeedInterface>>,
		primary_implementation: String,
	) -> Result<Self, PriceFeedError> {
		if !implementations.contains_key(&primary_implementation) {
			return Err(PriceFeedError::Configuration(format!(
				"Primary implementation '{}' not found in available implementations",
				primary_implementation
			)));
		}

		Ok(Self {
			implementations,
			primary_implementation,
		})
	}

	pub async fn get_token_price(
		&self,
		request: &PriceRequest,
	) -> Result<TokenPrice, PriceFeedError> {
		let implementation = self
			.implementations
			.get(&self.primary_implementation)
			.ok_or_else(|| {
				PriceFeedError::Internal(format!(
					"Primary implementation '{}' not available",
					self.primary_implementation
				))
			})?;

		implementation.get_token_price(request).await
	}
}
