//! Order orchestration: filtering, rules, fill, then settlement.

use super::chains::ChainHandlers;
use crate::filter::{check_lists, ListVerdict};
use crate::SolverError;
use async_trait::async_trait;
use solver_delivery::backoff::sleep_or_cancel;
use solver_discovery::{DiscoveryError, OrderHandler};
use solver_order::RulesEngine;
use solver_types::{
	truncate_id, AllowBlockLists, OrderAction, OrderOutcome, ParsedArgs, SettleOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Drives one decoded order to a terminal [`OrderOutcome`].
pub struct OrderOrchestrator {
	lists: AllowBlockLists,
	rules: Arc<RulesEngine>,
	handlers: Arc<ChainHandlers>,
	grace_period: Duration,
	cancel: CancellationToken,
}

impl OrderOrchestrator {
	pub fn new(
		lists: AllowBlockLists,
		rules: Arc<RulesEngine>,
		handlers: Arc<ChainHandlers>,
		grace_period: Duration,
		cancel: CancellationToken,
	) -> Self {
		Self {
			lists,
			rules,
			handlers,
			grace_period,
			cancel,
		}
	}

	#[instrument(skip_all, fields(order_id = %truncate_id(&order.order_id)))]
	pub async fn process(&self, order: &ParsedArgs) -> Result<OrderOutcome, SolverError> {
		match check_lists(&self.lists, order) {
			ListVerdict::Allowed => {},
			verdict => {
				tracing::info!(?verdict, sender = %order.sender_address, "Order filtered");
				return Ok(OrderOutcome::Blocked);
			},
		}

		if let Err(rejection) = self.rules.evaluate(order).await {
			return Ok(OrderOutcome::RuleRejected {
				rule: rejection.rule.to_string(),
				reason: rejection.reason,
			});
		}

		if !self.fill(order).await? {
			return Ok(OrderOutcome::Filled);
		}

		tracing::debug!(grace_period = ?self.grace_period, "Waiting before settlement");
		sleep_or_cancel(self.grace_period, &self.cancel).await?;
		self.settle(order).await
	}

	/// Fills each instruction in order. Returns whether settlement is owed.
	async fn fill(&self, order: &ParsedArgs) -> Result<bool, SolverError> {
		for (index, instruction) in order.resolved_order.fill_instructions.iter().enumerate() {
			let chain_id = instruction.destination_chain_id;
			let handler = self.handlers.get(chain_id).await?;
			match handler.fill(order, instruction).await? {
				OrderAction::Settle => {
					tracing::info!(chain_id, instruction = index, "Filled");
					return Ok(true);
				},
				OrderAction::Complete => {
					tracing::debug!(chain_id, instruction = index, "Nothing to fill");
				},
				OrderAction::Error => {
					return Err(SolverError::Fill(format!(
						"instruction {} on chain {} failed",
						index, chain_id
					)));
				},
			}
		}
		Ok(false)
	}

	async fn settle(&self, order: &ParsedArgs) -> Result<OrderOutcome, SolverError> {
		let mut skipped = None;
		for instruction in &order.resolved_order.fill_instructions {
			let chain_id = instruction.destination_chain_id;
			let handler = self.handlers.get(chain_id).await?;
			match handler.settle(order, instruction).await? {
				SettleOutcome::Settled => tracing::info!(chain_id, "Settled"),
				SettleOutcome::AlreadySettled => tracing::info!(chain_id, "Already settled"),
				SettleOutcome::Skipped(reason) => {
					tracing::warn!(chain_id, %reason, "Settlement skipped");
					skipped = Some(reason);
				},
			}
		}
		Ok(match skipped {
			Some(reason) => OrderOutcome::SettlementSkipped { reason },
			None => OrderOutcome::Settled,
		})
	}
}

#[async_trait]
impl OrderHandler for OrderOrchestrator {
	async fn handle(&self, order: ParsedArgs) -> Result<(), DiscoveryError> {
		let outcome = self
			.process(&order)
			.await
			.map_err(|e| DiscoveryError::Handler(e.to_string()))?;
		if outcome.is_success() {
			tracing::info!(order_id = %truncate_id(&order.order_id), %outcome, "Order processed");
		} else {
			tracing::info!(order_id = %truncate_id(&order.order_id), %outcome, "Order rejected");
		}
		Ok(())
	}
}
