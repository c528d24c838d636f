//! Order rules module for the solver.
//!
//! Before any chain interaction the orchestrator runs each order through an
//! ordered pipeline of named rules. Rules are stateless and may issue
//! read-only queries; the first failing rule rejects the order.

use alloy_primitives::U256;
use async_trait::async_trait;
use solver_config::RulesConfig;
use solver_price::PriceFeedService;
use solver_types::{truncate_id, ImplementationRegistry, ParsedArgs, RuleResult};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub mod implementations {
	pub mod balance;
	pub mod profitability;
}

/// Errors that can occur while building or running rules.
#[derive(Debug, Error)]
pub enum RuleError {
	/// A configured rule name has no implementation.
	#[error("Unknown rule: {0}")]
	UnknownRule(String),
	/// Error that occurs when a rule's dependencies or parameters are invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// A read-only query issued by a rule failed.
	#[error("Query failed: {0}")]
	Query(String),
}

/// A named, stateless order validator.
#[async_trait]
pub trait Rule: Send + Sync {
	fn name(&self) -> &'static str;

	async fn evaluate(&self, order: &ParsedArgs) -> RuleResult;
}

/// Solver balances on destination chains.
#[async_trait]
pub trait BalanceSource: Send + Sync {
	/// Balance of `token` held by the solver on `chain_id`; `""` is native.
	async fn balance_of(&self, chain_id: u64, token: &str) -> Result<U256, RuleError>;
}

/// Dependencies shared by every rule factory.
#[derive(Clone)]
pub struct RuleContext {
	pub balances: Arc<dyn BalanceSource>,
	pub prices: Option<Arc<PriceFeedService>>,
	pub min_profit_bps: u32,
}

/// Type alias for rule factory functions.
pub type RuleFactory = fn(&RuleContext) -> Result<Box<dyn Rule>, RuleError>;

/// Registry trait for rule implementations.
pub trait RuleRegistry: ImplementationRegistry<Factory = RuleFactory> {}

/// Get all registered rule implementations.
pub fn get_all_implementations() -> Vec<(&'static str, RuleFactory)> {
	use implementations::{balance, profitability};

	vec![
		(balance::Registry::NAME, balance::Registry::factory()),
		(profitability::Registry::NAME, profitability::Registry::factory()),
	]
}

/// Runs the enabled rules in order.
pub struct RulesEngine {
	rules: Vec<Box<dyn Rule>>,
}

impl RulesEngine {
	pub fn new(rules: Vec<Box<dyn Rule>>) -> Self {
		Self { rules }
	}

	/// Builds the pipeline named by `config.enabled`, failing on unknown names.
	pub fn from_config(config: &RulesConfig, context: RuleContext) -> Result<Self, RuleError> {
		let factories: HashMap<&'static str, RuleFactory> =
			get_all_implementations().into_iter().collect();
		let context = RuleContext {
			min_profit_bps: config.min_profit_bps,
			..context
		};

		let rules = config
			.enabled
			.iter()
			.map(|name| {
				let factory = factories
					.get(name.as_str())
					.ok_or_else(|| RuleError::UnknownRule(name.clone()))?;
				factory(&context)
			})
			.collect::<Result<Vec<_>, _>>()?;

		tracing::info!(rules = ?config.enabled, "Loaded rules");
		Ok(Self::new(rules))
	}

	pub fn rule_names(&self) -> Vec<&'static str> {
		self.rules.iter().map(|r| r.name()).collect()
	}

	/// Runs every rule in order, stopping at the first failure.
	pub async fn evaluate(&self, order: &ParsedArgs) -> Result<(), Rejection> {
		for rule in &self.rules {
			let result = rule.evaluate(order).await;
			if !result.passed {
				tracing::info!(
					order_id = %truncate_id(&order.order_id),
					rule = rule.name(),
					reason = %result.reason,
					"Rule rejected order"
				);
				return Err(Rejection {
					rule: rule.name(),
					reason: result.reason,
				});
			}
			tracing::debug!(rule = rule.name(), reason = %result.reason, "Rule passed");
		}
		Ok(())
	}
}

/// The first rule that failed an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
	pub rule: &'static str,
	pub reason: String,
}


#[cfg(test)]
mod tests {
	use super::test_support::*;
	use super::*;

	struct Fixed(&'static str, bool);

	#[async_trait]
	impl Rule for Fixed {
		fn name(&self) -> &'static str {
			self.0
		}

		async fn evaluate(&self, _order: &ParsedArgs) -> RuleResult {
			if self.1 {
				RuleResult::pass("ok")
			} else {
				RuleResult::fail("nope")
			}
		}
	}

	#[tokio::test]
	async fn test_first_failure_wins() {
		let engine = RulesEngine::new(vec![
			Box::new(Fixed("a", true)),
			Box::new(Fixed("b", false)),
			Box::new(Fixed("c", false)),
		]);
		assert_eq!(
			engine.evaluate(&order(vec![], vec![])).await,
			Err(Rejection {
				rule: "b",
				reason: "nope".to_string()
			})
		);

		let empty = RulesEngine::new(vec![]);
		assert!(empty.evaluate(&order(vec![], vec![])).await.is_ok());
	}

	#[test]
	fn test_from_config_keeps_order_and_rejects_unknown() {
		let config = RulesConfig {
			enabled: vec!["balance".to_string()],
			min_profit_bps: 0,
		};
		let engine = RulesEngine::from_config(&config, context(FakeBalances::default())).unwrap();
		assert_eq!(engine.rule_names(), vec!["balance"]);

		let config = RulesConfig {
			enabled: vec!["balance".to_string(), "gas".to_string()],
			min_profit_bps: 0,
		};
		assert!(matches!(
			RulesEngine::from_config(&config, context(FakeBalances::default())),
			Err(RuleError::UnknownRule(name)) if name == "gas"
		));
	}

	#[test]
	fn test_profitability_requires_price_feed() {
		let config = RulesConfig {
			enabled: vec!["profitability".to_string()],
			min_profit_bps: 50,
		};
		assert!(matches!(
			RulesEngine::from_config(&config, context(FakeBalances::default())),
			Err(RuleError::Configuration(_))
		));
	}
}
