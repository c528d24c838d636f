//! Core solver engine for the cross-chain solver.
//!
//! Wires discovery to delivery: every decoded order passes the allow/block
//! lists and the rules engine, then is filled on each destination chain and
//! settled back to its origin. The [`engine::SolverEngine`] supervises one
//! listener task per configured chain and shuts them down together.

use solver_account::AccountError;
use solver_config::ConfigError;
use solver_delivery::DeliveryError;
use solver_discovery::DiscoveryError;
use solver_order::RuleError;
use solver_price::PriceFeedError;
use solver_storage::StorageError;
use solver_types::RegistryError;
use thiserror::Error;

pub mod builder;
pub mod engine;
pub mod filter;
pub mod handlers;

pub use builder::{SolverBuilder, SolverFactories};
pub use engine::SolverEngine;
pub use handlers::{ChainHandlers, OrderOrchestrator};

/// Errors that can occur during solver operations.
#[derive(Debug, Error)]
pub enum SolverError {
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
	/// A fill instruction reported [`solver_types::OrderAction::Error`].
	#[error("Fill failed: {0}")]
	Fill(String),
	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Discovery error: {0}")]
	Discovery(#[from] DiscoveryError),
	#[error("Rule error: {0}")]
	Rule(#[from] RuleError),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Price feed error: {0}")]
	Price(#[from] PriceFeedError),
	#[error("Registry error: {0}")]
	Registry(#[from] RegistryError),
}

impl From<ConfigError> for SolverError {
	fn from(e: ConfigError) -> Self {
		SolverError::Config(e.to_string())
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use alloy_primitives::{Address, Bytes, B256, U256};
	use alloy_sol_types::{SolCall, SolValue};
	use async_trait::async_trait;
	use solver_delivery::implementations::evm::contracts::{IDestinationSettler, IERC20};
	use solver_delivery::implementations::evm::handler::EvmCall;
	use solver_delivery::{
		DeliveryError, EvmChainClient, EvmClientFactory, StarknetCall, StarknetChainClient,
		StarknetClientFactory, TxOutcome,
	};
	use solver_types::standards::Felt;
	use solver_types::{
		FillInstruction, NetworkConfig, NetworkRegistry, Output, ParsedArgs,
		ResolvedCrossChainOrder,
	};
	use std::collections::HashMap;
	use std::sync::{Arc, Mutex};

	pub(crate) const ORIGIN_CHAIN: u64 = 1;
	pub(crate) const ORIGIN_DOMAIN: u32 = 1;
	pub(crate) const EVM_CHAIN: u64 = 10;
	pub(crate) const STARKNET_CHAIN: u64 = 23448591;
	pub(crate) const FEE: U256 = U256::from_limbs([42, 0, 0, 0]);
	pub(crate) const SENDER: &str = "0x1111111111111111111111111111111111111111";
	pub(crate) const TOKEN: &str = "0x4444444444444444444444444444444444444444";
	pub(crate) const SETTLER: &str = "0x5555555555555555555555555555555555555555";

	pub(crate) fn registry() -> NetworkRegistry {
		let network = |name: &str, chain_id: u64, domain_id: u32| NetworkConfig {
			name: name.to_string(),
			chain_id,
			domain_id,
			rpc_url: format!("http://localhost/{}", name),
			settlement_live: true,
			native_token: None,
		};
		NetworkRegistry::new(vec![
			network("ethereum", ORIGIN_CHAIN, ORIGIN_DOMAIN),
			network("optimism", EVM_CHAIN, 10),
			network("starknet-sepolia", STARKNET_CHAIN, 23448591),
		])
		.unwrap()
	}

	/// Order from [`ORIGIN_CHAIN`] filled on [`EVM_CHAIN`].
	pub(crate) fn order(outputs: Vec<(&str, u64)>) -> ParsedArgs {
		let registry = registry();
		ParsedArgs::new(
			ResolvedCrossChainOrder {
				user: SENDER.to_string(),
				origin_chain_id: ORIGIN_CHAIN,
				open_deadline: 0,
				fill_deadline: u64::from(u32::MAX),
				order_id: B256::repeat_byte(0xab),
				max_spent: outputs
					.into_iter()
					.map(|(token, amount)| Output {
						token: token.to_string(),
						amount: U256::from(amount),
						recipient: format!("0x{}", "22".repeat(20)),
						chain_id: EVM_CHAIN,
					})
					.collect(),
				min_received: vec![],
				fill_instructions: vec![FillInstruction {
					destination_chain_id: EVM_CHAIN,
					destination_settler: SETTLER.to_string(),
					origin_data: Bytes::from(vec![0xd0, 0xd1]),
				}],
			},
			|chain_id| registry.chain_name(chain_id).map(str::to_string),
		)
	}

	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub(crate) enum SentKind {
		Approve,
		Fill,
		Settle,
	}

	/// Settler and token contracts in memory. Status advances when fill and
	/// settle transactions are sent.
	pub(crate) struct FakeEvmClient {
		chain_id: u64,
		revert_fill: bool,
		status: Mutex<&'static str>,
		quoted: Mutex<Vec<u32>>,
		sent: Mutex<Vec<(SentKind, U256)>>,
	}

	impl FakeEvmClient {
		pub(crate) fn sent_kinds(&self) -> Vec<SentKind> {
			self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
		}

		pub(crate) fn quoted_domains(&self) -> Vec<u32> {
			self.quoted.lock().unwrap().clone()
		}

		pub(crate) fn settle_value(&self) -> Option<U256> {
			self.sent
				.lock()
				.unwrap()
				.iter()
				.find(|(k, _)| *k == SentKind::Settle)
				.map(|(_, v)| *v)
		}
	}

	fn tag(label: &str) -> B256 {
		let mut bytes = [0u8; 32];
		bytes[..label.len()].copy_from_slice(label.as_bytes());
		B256::from(bytes)
	}

	#[async_trait]
	impl EvmChainClient for FakeEvmClient {
		fn chain_id(&self) -> u64 {
			self.chain_id
		}

		fn signer_address(&self) -> Address {
			Address::repeat_byte(0x77)
		}

		async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, DeliveryError> {
			let selector: [u8; 4] = data[..4].try_into().unwrap();
			let word = if selector == IDestinationSettler::orderStatusCall::SELECTOR {
				tag(*self.status.lock().unwrap()).abi_encode()
			} else if selector == IERC20::allowanceCall::SELECTOR {
				U256::ZERO.abi_encode()
			} else if selector == IDestinationSettler::quoteGasPaymentCall::SELECTOR {
				let call = IDestinationSettler::quoteGasPaymentCall::abi_decode(&data, true).unwrap();
				self.quoted.lock().unwrap().push(call.destinationDomain);
				FEE.abi_encode()
			} else if selector == IERC20::balanceOfCall::SELECTOR {
				U256::from(1_000u64).abi_encode()
			} else {
				return Err(DeliveryError::Network("unexpected call".to_string()));
			};
			Ok(word.into())
		}

		async fn native_balance(&self, _owner: Address) -> Result<U256, DeliveryError> {
			Ok(U256::from(1_000u64))
		}

		async fn send(&self, call: EvmCall) -> Result<TxOutcome, DeliveryError> {
			let selector: [u8; 4] = call.data[..4].try_into().unwrap();
			let kind = if selector == IDestinationSettler::fillCall::SELECTOR {
				SentKind::Fill
			} else if selector == IDestinationSettler::settleCall::SELECTOR {
				SentKind::Settle
			} else {
				SentKind::Approve
			};
			let success = !(kind == SentKind::Fill && self.revert_fill);
			if success {
				match kind {
					SentKind::Fill => *self.status.lock().unwrap() = "FILLED",
					SentKind::Settle => *self.status.lock().unwrap() = "SETTLED",
					SentKind::Approve => {},
				}
			}
			let mut sent = self.sent.lock().unwrap();
			sent.push((kind, call.value));
			Ok(TxOutcome {
				hash: format!("0x{:064x}", sent.len()),
				success,
			})
		}
	}

	#[derive(Default)]
	pub(crate) struct FakeEvmClients {
		pub(crate) revert_fill: bool,
		clients: Mutex<HashMap<u64, Arc<FakeEvmClient>>>,
		created: Mutex<Vec<u64>>,
	}

	impl FakeEvmClients {
		pub(crate) fn reverting_fills() -> Self {
			Self {
				revert_fill: true,
				..Default::default()
			}
		}

		pub(crate) fn created(&self) -> Vec<u64> {
			self.created.lock().unwrap().clone()
		}

		pub(crate) fn client(&self, chain_id: u64) -> Arc<FakeEvmClient> {
			self.clients.lock().unwrap()[&chain_id].clone()
		}
	}

	impl EvmClientFactory for FakeEvmClients {
		fn create(&self, chain_id: u64) -> Result<Arc<dyn EvmChainClient>, DeliveryError> {
			self.created.lock().unwrap().push(chain_id);
			let client = Arc::new(FakeEvmClient {
				chain_id,
				revert_fill: self.revert_fill,
				status: Mutex::new(""),
				quoted: Mutex::new(vec![]),
				sent: Mutex::new(vec![]),
			});
			self.clients.lock().unwrap().insert(chain_id, client.clone());
			Ok(client)
		}
	}

	struct IdleStarknetClient(u64);

	#[async_trait]
	impl StarknetChainClient for IdleStarknetClient {
		fn chain_id(&self) -> u64 {
			self.0
		}

		fn account_address(&self) -> Felt {
			Felt::from(0x42u8)
		}

		async fn call(
			&self,
			_contract: Felt,
			_entrypoint: &str,
			_calldata: Vec<Felt>,
		) -> Result<Vec<Felt>, DeliveryError> {
			Ok(vec![Felt::ZERO, Felt::ZERO])
		}

		async fn execute(&self, _calls: Vec<StarknetCall>) -> Result<TxOutcome, DeliveryError> {
			Err(DeliveryError::Network("read-only client".to_string()))
		}
	}

	#[derive(Default)]
	pub(crate) struct FakeStarknetClients {
		created: Mutex<Vec<u64>>,
	}

	impl FakeStarknetClients {
		pub(crate) fn created(&self) -> Vec<u64> {
			self.created.lock().unwrap().clone()
		}
	}

	impl StarknetClientFactory for FakeStarknetClients {
		fn create(&self, chain_id: u64) -> Result<Arc<dyn StarknetChainClient>, DeliveryError> {
			self.created.lock().unwrap().push(chain_id);
			Ok(Arc::new(IdleStarknetClient(chain_id)))
		}
	}
}
