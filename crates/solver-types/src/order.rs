//! Order processing types for the solver system.
//!
//! This module defines the per-event order envelope handed from discovery to
//! the orchestrator, the outcomes of fill and settle attempts, on-chain status
//! tags, and the allow/block list and rule result types.

use crate::standards::eip7683::ResolvedCrossChainOrder;
use crate::standards::starknet::{decode_short_string, Felt};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wildcard accepted by every allow/block list field and by recipients.
pub const WILDCARD: &str = "*";

/// A destination chain and address that will receive assets from an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
	pub destination_chain_name: String,
	pub recipient_address: String,
}

/// A decoded "Open" event, consumed by exactly one orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedArgs {
	/// `0x`-prefixed hex order ID.
	pub order_id: String,
	pub sender_address: String,
	pub recipients: Vec<Recipient>,
	pub resolved_order: ResolvedCrossChainOrder,
}

impl ParsedArgs {
	/// Builds the envelope, deriving recipients from the outputs the solver
	/// must deliver.
	pub fn new(
		resolved_order: ResolvedCrossChainOrder,
		chain_name: impl Fn(u64) -> Option<String>,
	) -> Self {
		let recipients = resolved_order
			.max_spent
			.iter()
			.map(|output| Recipient {
				destination_chain_name: chain_name(output.chain_id)
					.unwrap_or_else(|| output.chain_id.to_string()),
				recipient_address: output.recipient.clone(),
			})
			.collect();
		Self {
			order_id: format!("{}", resolved_order.order_id),
			sender_address: resolved_order.user.clone(),
			recipients,
			resolved_order,
		}
	}

	pub fn order_id_bytes(&self) -> B256 {
		self.resolved_order.order_id
	}
}

/// Result of a single fill attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
	/// The fill is on chain; settlement is still owed.
	Settle,
	/// Nothing further is required for this instruction.
	Complete,
	/// The fill failed and the order must be abandoned.
	Error,
}

/// Result of a settle attempt that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleOutcome {
	/// A settle transaction was mined successfully.
	Settled,
	/// The destination already reports the order as settled.
	AlreadySettled,
	/// Settlement was deliberately not attempted.
	Skipped(String),
}

/// Terminal result of one orchestration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
	/// Rejected by the allow/block lists.
	Blocked,
	/// Rejected by the named rule.
	RuleRejected { rule: String, reason: String },
	/// Filled with no settlement owed.
	Filled,
	Settled,
	/// Filled, but settlement was deliberately not attempted.
	SettlementSkipped { reason: String },
}

impl OrderOutcome {
	/// `false` for policy rejections, which are unsuccessful without being errors.
	pub fn is_success(&self) -> bool {
		!matches!(self, OrderOutcome::Blocked | OrderOutcome::RuleRejected { .. })
	}
}

impl fmt::Display for OrderOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderOutcome::Blocked => write!(f, "Blocked"),
			OrderOutcome::RuleRejected { rule, reason } => {
				write!(f, "RuleRejected({}: {})", rule, reason)
			},
			OrderOutcome::Filled => write!(f, "Filled"),
			OrderOutcome::Settled => write!(f, "Settled"),
			OrderOutcome::SettlementSkipped { reason } => write!(f, "SettlementSkipped({})", reason),
		}
	}
}

/// Order status reported by a destination settler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
	Unknown,
	Filled,
	Settled,
	/// A tag this solver does not interpret, kept verbatim for diagnostics.
	Unrecognized(String),
}

impl OrderStatus {
	const FILLED: &'static str = "FILLED";
	const SETTLED: &'static str = "SETTLED";

	fn from_label(label: &str, raw: impl FnOnce() -> String) -> Self {
		match label {
			"" | "UNKNOWN" => OrderStatus::Unknown,
			Self::FILLED => OrderStatus::Filled,
			Self::SETTLED => OrderStatus::Settled,
			_ => OrderStatus::Unrecognized(raw()),
		}
	}

	/// Maps an EVM `bytes32` tag holding left-aligned ASCII.
	pub fn from_evm_tag(tag: &B256) -> Self {
		let end = tag.iter().position(|b| *b == 0).unwrap_or(32);
		let padding_clean = tag[end..].iter().all(|b| *b == 0);
		match std::str::from_utf8(&tag[..end]) {
			Ok(label) if padding_clean => Self::from_label(label, || format!("{}", tag)),
			_ => OrderStatus::Unrecognized(format!("{}", tag)),
		}
	}

	/// Maps a Starknet short-string felt tag.
	pub fn from_felt_tag(tag: Felt) -> Self {
		match decode_short_string(tag) {
			Ok(label) => Self::from_label(&label, || format!("{:#x}", tag)),
			Err(_) => OrderStatus::Unrecognized(format!("{:#x}", tag)),
		}
	}

	pub fn is_filled_or_settled(&self) -> bool {
		matches!(self, OrderStatus::Filled | OrderStatus::Settled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Unknown => write!(f, "Unknown"),
			OrderStatus::Filled => write!(f, "Filled"),
			OrderStatus::Settled => write!(f, "Settled"),
			OrderStatus::Unrecognized(raw) => write!(f, "Unrecognized({})", raw),
		}
	}
}

/// One allow or block list entry. Each field is a literal or `"*"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowBlockListItem {
	pub sender_address: String,
	pub destination_domain: String,
	pub recipient_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowBlockLists {
	#[serde(default)]
	pub allow_list: Vec<AllowBlockListItem>,
	#[serde(default)]
	pub block_list: Vec<AllowBlockListItem>,
}

/// Verdict of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleResult {
	pub passed: bool,
	pub reason: String,
}

impl RuleResult {
	pub fn pass(reason: impl Into<String>) -> Self {
		Self {
			passed: true,
			reason: reason.into(),
		}
	}

	pub fn fail(reason: impl Into<String>) -> Self {
		Self {
			passed: false,
			reason: reason.into(),
		}
	}
}
