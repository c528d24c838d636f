//! Order discovery module for the solver.
//!
//! Watches origin settler contracts for `Open` events and hands every decoded
//! order to an [`OrderHandler`]. Each configured chain gets one
//! [`BlockRangeListener`] that backfills from its start block, then polls the
//! chain tip, persisting progress after every block chunk so a restart picks
//! up where the previous run stopped.
//!
//! Chain specifics live behind [`OpenEventSource`]: one implementation reads
//! EVM logs through alloy, the other reads Starknet events over JSON-RPC.

use async_trait::async_trait;
use solver_storage::{ProgressStore, StorageError};
use solver_types::standards::{FeltError, OrderDataError};
use solver_types::utils::ConversionError;
use solver_types::{
	ChainFamily, ListenerConfig, NetworkRegistry, ParsedArgs, RegistryError,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod decode;
pub mod implementations {
	pub mod evm;
	pub mod starknet;
}
pub mod listener;

pub use listener::{
	block_chunks, initial_last_processed, resolve_start_block, safe_block, BlockRangeListener,
	CycleOutcome,
};

/// Errors that can occur while decoding a single event.
#[derive(Debug, Error)]
pub enum DecodeError {
	/// The ABI payload could not be decoded.
	#[error("ABI decode failed: {0}")]
	Abi(String),
	/// The felt payload could not be decoded.
	#[error(transparent)]
	Felt(#[from] FeltError),
	/// The indexed order ID disagrees with the one inside the order.
	#[error("Order id mismatch: topic {topic}, body {body}")]
	OrderIdMismatch { topic: String, body: String },
	/// Origin data could not be re-encoded for the destination chain.
	#[error(transparent)]
	OriginData(#[from] OrderDataError),
	/// An address could not be normalized.
	#[error(transparent)]
	Address(#[from] ConversionError),
	/// A domain field does not fit in 32 bits.
	#[error("Domain out of range in {field}: {value}")]
	DomainOutOfRange { field: &'static str, value: String },
	/// The event is missing required metadata.
	#[error("Malformed event: {0}")]
	Malformed(String),
}

/// Errors that can occur during order discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	/// Error that occurs when talking to the chain node fails.
	#[error("Connection error: {0}")]
	Connection(String),
	/// Error that occurs when an event cannot be decoded.
	#[error("Decode error: {0}")]
	Decode(#[from] DecodeError),
	/// Error that occurs when reading or writing listener progress.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	/// Error that occurs when a listener references an unknown network.
	#[error("Registry error: {0}")]
	Registry(#[from] RegistryError),
	/// Error that occurs when listener configuration is unusable.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// Error reported by the order handler.
	#[error("Handler error: {0}")]
	Handler(String),
}

/// An event together with the block that contains it.
#[derive(Debug, Clone)]
pub struct SourceEvent<E> {
	pub block_number: u64,
	pub event: E,
}

/// Chain-specific access to `Open` events.
#[async_trait]
pub trait OpenEventSource: Send + Sync {
	/// Raw event representation produced by [`fetch_events`](Self::fetch_events).
	type Event: Send + Sync;

	/// Current chain tip.
	async fn latest_block(&self) -> Result<u64, DiscoveryError>;

	/// All `Open` events emitted by the watched contract in `[from, to]`, in
	/// chain order.
	async fn fetch_events(
		&self,
		from: u64,
		to: u64,
	) -> Result<Vec<SourceEvent<Self::Event>>, DiscoveryError>;

	/// Translates a raw event into the canonical order envelope.
	fn decode(
		&self,
		event: &Self::Event,
		registry: &NetworkRegistry,
	) -> Result<ParsedArgs, DecodeError>;
}

/// Receives every decoded order, in block order per chain.
#[async_trait]
pub trait OrderHandler: Send + Sync {
	async fn handle(&self, order: ParsedArgs) -> Result<(), DiscoveryError>;
}

/// Starts one listener per configured chain.
pub struct DiscoveryService {
	listeners: Vec<ListenerConfig>,
	registry: Arc<NetworkRegistry>,
	progress: Arc<dyn ProgressStore>,
	handler: Arc<dyn OrderHandler>,
}

impl DiscoveryService {
	pub fn new(
		listeners: Vec<ListenerConfig>,
		registry: Arc<NetworkRegistry>,
		progress: Arc<dyn ProgressStore>,
		handler: Arc<dyn OrderHandler>,
	) -> Self {
		Self {
			listeners,
			registry,
			progress,
			handler,
		}
	}

	/// Builds the event source for every listener and spawns its task.
	///
	/// Fails before spawning anything if any listener cannot be constructed.
	pub fn start_all(
		&self,
		cancel: &CancellationToken,
	) -> Result<Vec<JoinHandle<Result<(), DiscoveryError>>>, DiscoveryError> {
		let mut evm = Vec::new();
		let mut starknet = Vec::new();

		for config in &self.listeners {
			let network = self
				.registry
				.by_name(&config.chain_name)
				.ok_or_else(|| {
					DiscoveryError::Configuration(format!(
						"Listener references unknown network '{}'",
						config.chain_name
					))
				})?;

			match self.registry.family(network.chain_id)? {
				ChainFamily::Evm => {
					let source = implementations::evm::EvmEventSource::new(
						&network.rpc_url,
						&config.contract_address,
					)?;
					evm.push(self.listener(config, source, cancel));
				},
				ChainFamily::Starknet => {
					let source = implementations::starknet::StarknetEventSource::new(
						&network.rpc_url,
						&config.contract_address,
					)?;
					starknet.push(self.listener(config, source, cancel));
				},
			}
		}

		let mut handles = Vec::with_capacity(evm.len() + starknet.len());
		for listener in evm {
			handles.push(tokio::spawn(listener.run()));
		}
		for listener in starknet {
			handles.push(tokio::spawn(listener.run()));
		}
		Ok(handles)
	}

	fn listener<S: OpenEventSource>(
		&self,
		config: &ListenerConfig,
		source: S,
		cancel: &CancellationToken,
	) -> BlockRangeListener<S> {
		BlockRangeListener::new(
			config.clone(),
			source,
			self.registry.clone(),
			self.progress.clone(),
			self.handler.clone(),
			cancel.child_token(),
		)
	}
}
