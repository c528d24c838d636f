//! EVM `Open` event source.
//!
//! Reads logs from the origin settler through an alloy HTTP provider and
//! decodes the ABI-encoded resolved order carried by each event.

use crate::decode::{family_of, parsed_args, resolve_domain};
use crate::{DecodeError, DiscoveryError, OpenEventSource, SourceEvent};
use alloy_primitives::{Address, Log as PrimLog, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::Filter;
use alloy_sol_types::{sol, SolEvent};
use alloy_transport_http::Http;
use async_trait::async_trait;
use solver_types::standards::convert_origin_data;
use solver_types::utils::{format_address, format_token, parse_evm_address, to_bytes32};
use solver_types::{
	ChainFamily, FillInstruction, NetworkRegistry, Output, ParsedArgs, ResolvedCrossChainOrder,
};

sol! {
	/// A token movement on one chain; chain IDs are domains on the wire.
	struct SolOutput {
		bytes32 token;
		uint256 amount;
		bytes32 recipient;
		uint256 chainId;
	}

	struct SolFillInstruction {
		uint64 destinationChainId;
		bytes32 destinationSettler;
		bytes originData;
	}

	struct SolResolvedCrossChainOrder {
		address user;
		uint256 originChainId;
		uint32 openDeadline;
		uint32 fillDeadline;
		bytes32 orderId;
		SolOutput[] maxSpent;
		SolOutput[] minReceived;
		SolFillInstruction[] fillInstructions;
	}

	/// Emitted by the origin settler when an order is opened.
	event Open(bytes32 indexed orderId, SolResolvedCrossChainOrder resolvedOrder);
}

fn domain_from_u256(value: U256, field: &'static str) -> Result<u32, DecodeError> {
	if value.bit_len() > 32 {
		return Err(DecodeError::DomainOutOfRange {
			field,
			value: value.to_string(),
		});
	}
	Ok(value.to::<u32>())
}

fn decode_output(registry: &NetworkRegistry, output: &SolOutput) -> Result<Output, DecodeError> {
	let domain = domain_from_u256(output.chainId, "output.chainId")?;
	let chain_id = resolve_domain(registry, domain, "output.chainId");
	let family = family_of(registry, chain_id);
	Ok(Output {
		token: format_token(&output.token.0, family),
		amount: output.amount,
		recipient: format_address(&output.recipient.0, family),
		chain_id,
	})
}

fn decode_fill_instruction(
	registry: &NetworkRegistry,
	instruction: &SolFillInstruction,
) -> Result<FillInstruction, DecodeError> {
	let domain = u32::try_from(instruction.destinationChainId).map_err(|_| {
		DecodeError::DomainOutOfRange {
			field: "fillInstruction.destinationChainId",
			value: instruction.destinationChainId.to_string(),
		}
	})?;
	let chain_id = resolve_domain(registry, domain, "fillInstruction.destinationChainId");
	let family = family_of(registry, chain_id);
	Ok(FillInstruction {
		destination_chain_id: chain_id,
		destination_settler: format_address(&instruction.destinationSettler.0, family),
		origin_data: convert_origin_data(&instruction.originData, ChainFamily::Evm, family)?,
	})
}

/// Decodes a raw `Open` log into the canonical order envelope.
pub fn decode_open_log(log: &PrimLog, registry: &NetworkRegistry) -> Result<ParsedArgs, DecodeError> {
	let event = Open::decode_log(log, true)
		.map_err(|e| DecodeError::Abi(format!("Failed to decode Open event: {}", e)))?
		.data;
	let order = event.resolvedOrder;

	if event.orderId != order.orderId {
		return Err(DecodeError::OrderIdMismatch {
			topic: event.orderId.to_string(),
			body: order.orderId.to_string(),
		});
	}

	let origin_domain = domain_from_u256(order.originChainId, "originChainId")?;
	let resolved = ResolvedCrossChainOrder {
		user: format_address(&to_bytes32(order.user.as_slice())?, ChainFamily::Evm),
		origin_chain_id: resolve_domain(registry, origin_domain, "originChainId"),
		open_deadline: u64::from(order.openDeadline),
		fill_deadline: u64::from(order.fillDeadline),
		order_id: order.orderId,
		max_spent: order
			.maxSpent
			.iter()
			.map(|o| decode_output(registry, o))
			.collect::<Result<_, _>>()?,
		min_received: order
			.minReceived
			.iter()
			.map(|o| decode_output(registry, o))
			.collect::<Result<_, _>>()?,
		fill_instructions: order
			.fillInstructions
			.iter()
			.map(|i| decode_fill_instruction(registry, i))
			.collect::<Result<_, _>>()?,
	};

	Ok(parsed_args(registry, resolved))
}

/// `Open` events from one EVM origin settler.
pub struct EvmEventSource {
	provider: RootProvider<Http<reqwest::Client>>,
	contract: Address,
}

impl EvmEventSource {
	pub fn new(rpc_url: &str, contract_address: &str) -> Result<Self, DiscoveryError> {
		let provider = RootProvider::new_http(
			rpc_url
				.parse()
				.map_err(|e| DiscoveryError::Configuration(format!("Invalid RPC URL: {}", e)))?,
		);
		let contract = parse_evm_address(contract_address).map_err(|e| {
			DiscoveryError::Configuration(format!("Invalid contract address: {}", e))
		})?;
		Ok(Self { provider, contract })
	}
}

#[async_trait]
impl OpenEventSource for EvmEventSource {
	type Event = PrimLog;

	async fn latest_block(&self) -> Result<u64, DiscoveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DiscoveryError::Connection(format!("Failed to get block number: {}", e)))
	}

	async fn fetch_events(
		&self,
		from: u64,
		to: u64,
	) -> Result<Vec<SourceEvent<PrimLog>>, DiscoveryError> {
		let filter = Filter::new()
			.address(self.contract)
			.event_signature(Open::SIGNATURE_HASH)
			.from_block(from)
			.to_block(to);

		let logs = self
			.provider
			.get_logs(&filter)
			.await
			.map_err(|e| DiscoveryError::Connection(format!("Failed to get logs: {}", e)))?;

		let mut events = Vec::with_capacity(logs.len());
		for log in logs {
			match log.block_number {
				Some(block_number) => events.push(SourceEvent {
					block_number,
					event: log.inner,
				}),
				None => tracing::warn!("Dropping log without block number"),
			}
		}
		Ok(events)
	}

	fn decode(&self, event: &PrimLog, registry: &NetworkRegistry) -> Result<ParsedArgs, DecodeError> {
		decode_open_log(event, registry)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::decode::fixtures::{registry, STARKNET_CHAIN};
	use alloy_primitives::{address, Bytes, B256};
	use solver_types::standards::OrderData;

	fn origin_data() -> OrderData {
		OrderData {
			sender: B256::repeat_byte(0x11),
			recipient: B256::repeat_byte(0x22),
			input_token: B256::repeat_byte(0x33),
			output_token: B256::repeat_byte(0x44),
			amount_in: U256::from(100u64),
			amount_out: U256::from(99u64),
			sender_nonce: U256::from(7u64),
			origin_domain: 10,
			destination_domain: STARKNET_CHAIN as u32,
			destination_settler: B256::repeat_byte(0x55),
			fill_deadline: 1_900_000_000,
			data: vec![0xde, 0xad],
		}
	}

	fn output(token: B256, amount: u64, chain: u64) -> SolOutput {
		SolOutput {
			token,
			amount: U256::from(amount),
			recipient: B256::repeat_byte(0x22),
			chainId: U256::from(chain),
		}
	}

	fn open_event(order_id: B256, body_id: B256, destination: u64) -> Open {
		Open {
			orderId: order_id,
			resolvedOrder: SolResolvedCrossChainOrder {
				user: address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266"),
				originChainId: U256::from(10u64),
				openDeadline: 1_800_000_000,
				fillDeadline: 1_900_000_000,
				orderId: body_id,
				maxSpent: vec![output(B256::repeat_byte(0x44), 99, destination)],
				minReceived: vec![output(B256::ZERO, 100, 10)],
				fillInstructions: vec![SolFillInstruction {
					destinationChainId: destination,
					destinationSettler: B256::repeat_byte(0x55),
					originData: Bytes::from(origin_data().encode_abi()),
				}],
			},
		}
	}

	fn to_log(event: &Open) -> PrimLog {
		PrimLog {
			address: Address::ZERO,
			data: event.encode_log_data(),
		}
	}

	#[test]
	fn test_decode_evm_to_starknet_order() {
		let id = B256::repeat_byte(0xab);
		let parsed =
			decode_open_log(&to_log(&open_event(id, id, STARKNET_CHAIN)), &registry()).unwrap();

		assert_eq!(parsed.order_id, format!("0x{}", "ab".repeat(32)));
		assert_eq!(parsed.sender_address, "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

		let order = &parsed.resolved_order;
		assert_eq!(order.origin_chain_id, 10);
		assert_eq!(order.open_deadline, 1_800_000_000);

		// Destination output is Starknet-formatted; origin native token is ""
		assert_eq!(order.max_spent[0].token, format!("0x{}", "44".repeat(32)));
		assert_eq!(order.max_spent[0].chain_id, STARKNET_CHAIN);
		assert_eq!(order.min_received[0].token, "");
		assert_eq!(order.min_received[0].recipient, format!("0x{}", "22".repeat(20)));

		// ABI origin data is re-encoded packed for the Starknet destination
		let instruction = &order.fill_instructions[0];
		assert_eq!(instruction.destination_chain_id, STARKNET_CHAIN);
		assert_eq!(instruction.origin_data.to_vec(), origin_data().encode_packed());

		assert_eq!(parsed.recipients.len(), 1);
		assert_eq!(parsed.recipients[0].destination_chain_name, "starknet-sepolia");
	}

	#[test]
	fn test_evm_destination_keeps_origin_data() {
		let id = B256::repeat_byte(0x01);
		let parsed = decode_open_log(&to_log(&open_event(id, id, 8453)), &registry()).unwrap();
		let instruction = &parsed.resolved_order.fill_instructions[0];
		assert_eq!(instruction.origin_data.to_vec(), origin_data().encode_abi());
		assert_eq!(
			instruction.destination_settler,
			format!("0x{}", "55".repeat(20))
		);
		assert_eq!(parsed.recipients[0].destination_chain_name, "base");
	}

	#[test]
	fn test_unknown_domain_falls_back_to_numeric_chain() {
		let id = B256::repeat_byte(0x02);
		let parsed = decode_open_log(&to_log(&open_event(id, id, 777)), &registry()).unwrap();
		assert_eq!(parsed.resolved_order.max_spent[0].chain_id, 777);
		assert_eq!(parsed.recipients[0].destination_chain_name, "777");
	}

	#[test]
	fn test_rejects_order_id_mismatch() {
		let event = open_event(B256::repeat_byte(0x01), B256::repeat_byte(0x02), 8453);
		assert!(matches!(
			decode_open_log(&to_log(&event), &registry()),
			Err(DecodeError::OrderIdMismatch { .. })
		));
	}

	#[test]
	fn test_rejects_foreign_log() {
		let log = PrimLog {
			address: Address::ZERO,
			data: alloy_primitives::LogData::new_unchecked(vec![B256::ZERO], Bytes::new()),
		};
		assert!(matches!(
			decode_open_log(&log, &registry()),
			Err(DecodeError::Abi(_))
		));
	}
}
