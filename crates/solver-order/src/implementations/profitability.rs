//! Accepts orders whose received value beats the spent value by a margin.
//!
//! Values are compared in micro-USD using the configured price feed. The
//! rule refuses to guess: an empty side or a token without a price fails
//! the order.

use crate::{Rule, RuleContext, RuleError, RuleFactory, RuleRegistry};
use alloy_primitives::U256;
use async_trait::async_trait;
use solver_price::{PriceFeedService, PriceRequest};
use solver_types::{ImplementationRegistry, Output, ParsedArgs, RuleResult};
use std::sync::Arc;

const NO_DATA: &str = "no comparison data";
const BPS: u64 = 10_000;

pub struct ProfitabilityRule {
	prices: Arc<PriceFeedService>,
	min_profit_bps: u32,
}

impl ProfitabilityRule {
	pub fn new(prices: Arc<PriceFeedService>, min_profit_bps: u32) -> Self {
		Self {
			prices,
			min_profit_bps,
		}
	}

	/// Total micro-USD value, or `None` if any output has no usable price.
	async fn value_of(&self, outputs: &[Output]) -> Option<U256> {
		let mut total = U256::ZERO;
		for output in outputs {
			let request = PriceRequest {
				token_address: output.token.clone(),
				chain_id: output.chain_id,
			};
			let value = match self.prices.get_token_price(&request).await {
				Ok(price) => price.value_of(output.amount),
				Err(e) => Err(e),
			};
			match value {
				Ok(value) => total = total.saturating_add(value),
				Err(e) => {
					tracing::debug!(token = %output.token, chain_id = output.chain_id, error = %e, "No price");
					return None;
				},
			}
		}
		Some(total)
	}
}

#[async_trait]
impl Rule for ProfitabilityRule {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	async fn evaluate(&self, order: &ParsedArgs) -> RuleResult {
		let resolved = &order.resolved_order;
		if resolved.max_spent.is_empty() || resolved.min_received.is_empty() {
			return RuleResult::fail(NO_DATA);
		}
		let (Some(spent), Some(received)) = (
			self.value_of(&resolved.max_spent).await,
			self.value_of(&resolved.min_received).await,
		) else {
			return RuleResult::fail(NO_DATA);
		};

		if received <= spent {
			return RuleResult::fail(format!(
				"not profitable: receives {} spends {} micro-USD",
				received, spent
			));
		}
		let profit = received - spent;
		let required = spent.saturating_mul(U256::from(self.min_profit_bps)) / U256::from(BPS);
		if profit < required {
			return RuleResult::fail(format!(
				"profit {} below minimum {} micro-USD ({} bps)",
				profit, required, self.min_profit_bps
			));
		}
		RuleResult::pass(format!("profit {} micro-USD", profit))
	}
}

fn create_rule(context: &RuleContext) -> Result<Box<dyn Rule>, RuleError> {
	let prices = context.prices.clone().ok_or_else(|| {
		RuleError::Configuration("profitability rule requires a [pricing] section".to_string())
	})?;
	Ok(Box::new(ProfitabilityRule::new(prices, context.min_profit_bps)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "profitability";
	type Factory = RuleFactory;

	fn factory() -> Self::Factory {
		create_rule
	}
}

impl RuleRegistry for Registry {}
