//! Starknet `Open` event source.
//!
//! Events are read with `starknet_getEvents`, following continuation tokens
//! until a block range is exhausted. The event payload is a flat felt array
//! decoded sequentially with a [`FeltCursor`].

use crate::decode::{family_of, parsed_args, resolve_domain};
use crate::{DecodeError, DiscoveryError, OpenEventSource, SourceEvent};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use solver_types::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use solver_types::standards::starknet::selector;
use solver_types::standards::{
	convert_origin_data, felt_from_hex, felt_to_hex, Felt, FeltCursor,
};
use solver_types::utils::{format_address, format_token, parse_bytes32};
use solver_types::{
	ChainFamily, FillInstruction, NetworkRegistry, Output, ParsedArgs, ResolvedCrossChainOrder,
};

/// Events requested per `starknet_getEvents` page.
const EVENTS_CHUNK_SIZE: u64 = 100;

/// A raw Starknet event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarknetEvent {
	pub keys: Vec<Felt>,
	pub data: Vec<Felt>,
}

#[derive(Debug, Deserialize)]
struct EmittedEvent {
	keys: Vec<String>,
	data: Vec<String>,
	#[serde(default)]
	block_number: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
	events: Vec<EmittedEvent>,
	#[serde(default)]
	continuation_token: Option<String>,
}

fn felt_bytes(felt: Felt) -> [u8; 32] {
	felt.to_be_bytes::<32>()
}

fn decode_output(
	registry: &NetworkRegistry,
	cursor: &mut FeltCursor<'_>,
) -> Result<Output, DecodeError> {
	let token = cursor.next_u256("output.token")?;
	let amount = cursor.next_u256("output.amount")?;
	let recipient = cursor.next_u256("output.recipient")?;
	let domain = cursor.next_u32("output.chain_id")?;
	let chain_id = resolve_domain(registry, domain, "output.chain_id");
	let family = family_of(registry, chain_id);
	Ok(Output {
		token: format_token(&felt_bytes(token), family),
		amount,
		recipient: format_address(&felt_bytes(recipient), family),
		chain_id,
	})
}

fn decode_outputs(
	registry: &NetworkRegistry,
	cursor: &mut FeltCursor<'_>,
	what: &'static str,
) -> Result<Vec<Output>, DecodeError> {
	let len = cursor.next_len(what)?;
	(0..len).map(|_| decode_output(registry, cursor)).collect()
}

fn decode_fill_instruction(
	registry: &NetworkRegistry,
	cursor: &mut FeltCursor<'_>,
) -> Result<FillInstruction, DecodeError> {
	let domain = cursor.next_u32("fill_instruction.destination_chain_id")?;
	let settler = cursor.next_u256("fill_instruction.destination_settler")?;
	let origin_data = cursor.next_bytes("fill_instruction.origin_data")?;
	let chain_id = resolve_domain(registry, domain, "fill_instruction.destination_chain_id");
	let family = family_of(registry, chain_id);
	Ok(FillInstruction {
		destination_chain_id: chain_id,
		destination_settler: format_address(&felt_bytes(settler), family),
		origin_data: convert_origin_data(&origin_data, ChainFamily::Starknet, family)?,
	})
}

/// Decodes a Starknet `Open` event into the canonical order envelope.
///
/// Keys are `[selector("Open"), order_id.low, order_id.high]`.
pub fn decode_open_event(
	event: &StarknetEvent,
	registry: &NetworkRegistry,
) -> Result<ParsedArgs, DecodeError> {
	let topic_id = match event.keys.as_slice() {
		[sel, id @ ..] if *sel == selector("Open") && id.len() == 2 => {
			FeltCursor::new(id).next_u256("key.order_id")?
		},
		_ => {
			return Err(DecodeError::Malformed(format!(
				"not an Open event ({} keys)",
				event.keys.len()
			)))
		},
	};

	let mut cursor = FeltCursor::new(&event.data);
	let user = cursor.next_felt("user")?;
	let origin_domain = cursor.next_u32("origin_domain")?;
	let open_deadline = cursor.next_u64("open_deadline")?;
	let fill_deadline = cursor.next_u64("fill_deadline")?;
	let order_id = cursor.next_u256("order_id")?;
	if order_id != topic_id {
		return Err(DecodeError::OrderIdMismatch {
			topic: felt_to_hex(topic_id),
			body: felt_to_hex(order_id),
		});
	}
	let max_spent = decode_outputs(registry, &mut cursor, "max_spent")?;
	let min_received = decode_outputs(registry, &mut cursor, "min_received")?;
	let instructions_len = cursor.next_len("fill_instructions")?;
	let fill_instructions = (0..instructions_len)
		.map(|_| decode_fill_instruction(registry, &mut cursor))
		.collect::<Result<Vec<_>, _>>()?;
	cursor.finish()?;

	let resolved = ResolvedCrossChainOrder {
		user: format_address(&felt_bytes(user), ChainFamily::Starknet),
		origin_chain_id: resolve_domain(registry, origin_domain, "origin_domain"),
		open_deadline,
		fill_deadline,
		order_id: order_id.into(),
		max_spent,
		min_received,
		fill_instructions,
	};
	Ok(parsed_args(registry, resolved))
}

/// `Open` events from one Starknet origin settler.
pub struct StarknetEventSource {
	client: reqwest::Client,
	rpc_url: String,
	contract: String,
}

impl StarknetEventSource {
	pub fn new(rpc_url: &str, contract_address: &str) -> Result<Self, DiscoveryError> {
		let contract = parse_bytes32(contract_address).map_err(|e| {
			DiscoveryError::Configuration(format!("Invalid contract address: {}", e))
		})?;
		Ok(Self {
			client: reqwest::Client::new(),
			rpc_url: rpc_url.to_string(),
			contract: format_address(&contract, ChainFamily::Starknet),
		})
	}

	async fn call<P: Serialize, T: DeserializeOwned>(
		&self,
		method: &str,
		params: P,
	) -> Result<T, DiscoveryError> {
		let response: JsonRpcResponse<T> = self
			.client
			.post(&self.rpc_url)
			.json(&JsonRpcRequest::new(method, params))
			.send()
			.await
			.map_err(|e| DiscoveryError::Connection(format!("{} failed: {}", method, e)))?
			.json()
			.await
			.map_err(|e| DiscoveryError::Connection(format!("{} bad response: {}", method, e)))?;
		response
			.into_result()
			.map_err(|e| DiscoveryError::Connection(format!("{}: {}", method, e)))
	}
}

fn parse_felts(values: &[String]) -> Result<Vec<Felt>, DecodeError> {
	values
		.iter()
		.map(|v| felt_from_hex(v).map_err(DecodeError::from))
		.collect()
}

#[async_trait]
impl OpenEventSource for StarknetEventSource {
	type Event = StarknetEvent;

	async fn latest_block(&self) -> Result<u64, DiscoveryError> {
		self.call("starknet_blockNumber", serde_json::json!([])).await
	}

	async fn fetch_events(
		&self,
		from: u64,
		to: u64,
	) -> Result<Vec<SourceEvent<StarknetEvent>>, DiscoveryError> {
		let mut events = Vec::new();
		let mut continuation_token: Option<String> = None;

		loop {
			let mut filter = serde_json::json!({
				"from_block": { "block_number": from },
				"to_block": { "block_number": to },
				"address": self.contract,
				"keys": [[felt_to_hex(selector("Open"))]],
				"chunk_size": EVENTS_CHUNK_SIZE,
			});
			if let Some(token) = &continuation_token {
				filter["continuation_token"] = serde_json::Value::String(token.clone());
			}

			let page: EventsPage = self
				.call("starknet_getEvents", serde_json::json!({ "filter": filter }))
				.await?;

			for emitted in page.events {
				let Some(block_number) = emitted.block_number else {
					tracing::warn!("Dropping pending Starknet event");
					continue;
				};
				match (parse_felts(&emitted.keys), parse_felts(&emitted.data)) {
					(Ok(keys), Ok(data)) => events.push(SourceEvent {
						block_number,
						event: StarknetEvent { keys, data },
					}),
					(Err(e), _) | (_, Err(e)) => {
						tracing::warn!(block = block_number, error = %e, "Dropping unparsable Starknet event");
					},
				}
			}

			match page.continuation_token {
				Some(token) => continuation_token = Some(token),
				None => break,
			}
		}

		Ok(events)
	}

	fn decode(
		&self,
		event: &StarknetEvent,
		registry: &NetworkRegistry,
	) -> Result<ParsedArgs, DecodeError> {
		decode_open_event(event, registry)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::decode::fixtures::{registry, STARKNET_CHAIN};
	use alloy_primitives::{B256, U256};
	use solver_types::standards::starknet::{encode_bytes, u256_to_felts};
	use solver_types::standards::{FeltError, OrderData};

	fn origin_data() -> OrderData {
		OrderData {
			sender: B256::repeat_byte(0x01),
			recipient: B256::repeat_byte(0x02),
			input_token: B256::repeat_byte(0x03),
			output_token: B256::repeat_byte(0x04),
			amount_in: U256::from(1_000u64),
			amount_out: U256::from(990u64),
			sender_nonce: U256::from(3u64),
			origin_domain: STARKNET_CHAIN as u32,
			destination_domain: 10,
			destination_settler: B256::repeat_byte(0x05),
			fill_deadline: 1_900_000_000,
			data: vec![],
		}
	}

	fn order_id() -> U256 {
		(U256::from(0xaau8) << 200) | U256::from(0x1234u32)
	}

	fn felt(v: u64) -> Felt {
		U256::from(v)
	}

	fn push_output(data: &mut Vec<Felt>, token: U256, amount: u64, recipient: U256, domain: u64) {
		data.extend(u256_to_felts(token));
		data.extend(u256_to_felts(U256::from(amount)));
		data.extend(u256_to_felts(recipient));
		data.push(felt(domain));
	}

	fn open_event() -> StarknetEvent {
		let [id_low, id_high] = u256_to_felts(order_id());
		let recipient = U256::from_be_bytes(B256::left_padding_from(&[0x22; 20]).0);

		let mut data = vec![
			U256::from(0x0123456789abcdefu64),
			felt(STARKNET_CHAIN),
			felt(1_800_000_000),
			felt(1_900_000_000),
			id_low,
			id_high,
		];
		// max_spent: one output on optimism
		data.push(felt(1));
		push_output(&mut data, U256::from(0x4444u32), 990, recipient, 10);
		// min_received: native token on the Starknet origin
		data.push(felt(1));
		push_output(&mut data, U256::ZERO, 1_000, U256::from(0x0123456789abcdefu64), STARKNET_CHAIN);
		// fill_instructions
		data.push(felt(1));
		data.push(felt(10));
		data.extend(u256_to_felts(U256::from(0x5555u32)));
		data.extend(encode_bytes(&origin_data().encode_packed()));

		StarknetEvent {
			keys: vec![selector("Open"), id_low, id_high],
			data,
		}
	}

	#[test]
	fn test_decode_starknet_to_evm_order() {
		let parsed = decode_open_event(&open_event(), &registry()).unwrap();
		let order = &parsed.resolved_order;

		assert_eq!(order.order_id, B256::from(order_id()));
		assert_eq!(order.origin_chain_id, STARKNET_CHAIN);
		assert_eq!(order.fill_deadline, 1_900_000_000);
		assert_eq!(
			parsed.sender_address,
			format!("0x{}0123456789abcdef", "0".repeat(48))
		);

		let spent = &order.max_spent[0];
		assert_eq!(spent.chain_id, 10);
		assert_eq!(spent.token, format!("0x{}4444", "0".repeat(36)));
		assert_eq!(spent.recipient, format!("0x{}", "22".repeat(20)));
		assert_eq!(order.min_received[0].token, "");

		let instruction = &order.fill_instructions[0];
		assert_eq!(instruction.destination_chain_id, 10);
		assert_eq!(instruction.destination_settler, format!("0x{}5555", "0".repeat(36)));
		// Packed origin data becomes ABI for the EVM destination
		assert_eq!(instruction.origin_data.to_vec(), origin_data().encode_abi());

		assert_eq!(parsed.recipients[0].destination_chain_name, "optimism");
	}

	#[test]
	fn test_rejects_trailing_and_truncated_data() {
		let mut event = open_event();
		event.data.push(felt(0));
		assert!(matches!(
			decode_open_event(&event, &registry()),
			Err(DecodeError::Felt(FeltError::Trailing(1)))
		));

		let mut event = open_event();
		event.data.truncate(12);
		assert!(matches!(
			decode_open_event(&event, &registry()),
			Err(DecodeError::Felt(_))
		));
	}

	#[test]
	fn test_rejects_out_of_range_domain() {
		let mut event = open_event();
		event.data[1] = U256::from(u64::from(u32::MAX) + 1);
		assert!(matches!(
			decode_open_event(&event, &registry()),
			Err(DecodeError::Felt(FeltError::OutOfRange { .. }))
		));
	}

	#[test]
	fn test_rejects_key_mismatch() {
		let mut event = open_event();
		event.keys[1] = felt(1);
		assert!(matches!(
			decode_open_event(&event, &registry()),
			Err(DecodeError::OrderIdMismatch { .. })
		));

		event.keys = vec![selector("Filled")];
		assert!(matches!(
			decode_open_event(&event, &registry()),
			Err(DecodeError::Malformed(_))
		));
	}

	#[test]
	fn test_events_page_parsing() {
		let page: EventsPage = serde_json::from_str(
			r#"{"events":[{"from_address":"0x1","keys":["0x2"],"data":["0x3","0x4"],"block_number":7,"block_hash":"0x9","transaction_hash":"0xa"}],"continuation_token":"1-0"}"#,
		)
		.unwrap();
		assert_eq!(page.events[0].block_number, Some(7));
		assert_eq!(parse_felts(&page.events[0].data).unwrap(), vec![felt(3), felt(4)]);
		assert_eq!(page.continuation_token.as_deref(), Some("1-0"));
	}
}
