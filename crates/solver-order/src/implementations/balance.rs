//! Rejects orders the solver cannot pay for on the destination chains.

use crate::{BalanceSource, Rule, RuleContext, RuleError, RuleFactory, RuleRegistry};
use alloy_primitives::U256;
use async_trait::async_trait;
use solver_types::{ImplementationRegistry, ParsedArgs, RuleResult};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct BalanceRule {
	balances: Arc<dyn BalanceSource>,
}

impl BalanceRule {
	pub fn new(balances: Arc<dyn BalanceSource>) -> Self {
		Self { balances }
	}
}

#[async_trait]
impl Rule for BalanceRule {
	fn name(&self) -> &'static str {
		Registry::NAME
	}

	async fn evaluate(&self, order: &ParsedArgs) -> RuleResult {
		let spent = &order.resolved_order.max_spent;
		if spent.is_empty() {
			return RuleResult::pass("no tokens to spend");
		}

		let mut required: BTreeMap<(u64, String), U256> = BTreeMap::new();
		for output in spent {
			let total = required
				.entry((output.chain_id, output.token.to_lowercase()))
				.or_default();
			*total = total.saturating_add(output.amount);
		}

		for ((chain_id, token), amount) in &required {
			let balance = match self.balances.balance_of(*chain_id, token).await {
				Ok(balance) => balance,
				Err(e) => return RuleResult::fail(e.to_string()),
			};
			if balance < *amount {
				let token = if token.is_empty() { "native" } else { token.as_str() };
				return RuleResult::fail(format!(
					"insufficient {} on chain {}: have {}, need {}",
					token, chain_id, balance, amount
				));
			}
		}
		RuleResult::pass("balances cover all outputs")
	}
}

fn create_rule(context: &RuleContext) -> Result<Box<dyn Rule>, RuleError> {
	Ok(Box::new(BalanceRule::new(context.balances.clone())))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "balance";
	type Factory = RuleFactory;

	fn factory() -> Self::Factory {
		create_rule
	}
}

impl RuleRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{order, output, FakeBalances, USDC};

	#[tokio::test]
	async fn test_empty_outputs_pass_without_reads() {
		let balances = Arc::new(FakeBalances::default());
		let rule = BalanceRule::new(balances.clone());
		let result = rule.evaluate(&order(vec![], vec![])).await;
		assert!(result.passed);
		assert_eq!(result.reason, "no tokens to spend");
		assert!(balances.reads.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_amounts_are_summed_per_token() {
		let balances = Arc::new(FakeBalances::default().with(10, USDC, 150).with(10, "", 5));
		let rule = BalanceRule::new(balances.clone());

		let covered = order(
			vec![output(10, USDC, 100), output(10, "", 5), output(10, USDC, 50)],
			vec![],
		);
		assert!(rule.evaluate(&covered).await.passed);
		// One read per (chain, token)
		assert_eq!(balances.reads.lock().unwrap().len(), 2);

		let short = order(vec![output(10, USDC, 100), output(10, USDC, 51)], vec![]);
		let result = rule.evaluate(&short).await;
		assert!(!result.passed);
		assert!(result.reason.contains("need 151"));
	}

	#[tokio::test]
	async fn test_read_failure_fails_rule() {
		let rule = BalanceRule::new(Arc::new(FakeBalances::default()));
		let result = rule.evaluate(&order(vec![output(10, USDC, 1)], vec![])).await;
		assert!(!result.passed);
		assert!(result.reason.contains("no balance"));
	}
}
