//! Common types module for the cross-chain solver.
//!
//! Shared by every solver crate: the canonical order model, the network
//! registry, address normalization and the wire codecs needed to move orders
//! between EVM and Starknet chains.

/// Listener configuration.
pub mod discovery;
/// JSON-RPC envelopes.
pub mod jsonrpc;
/// Network configuration and the process-wide chain registry.
pub mod networks;
/// Order envelopes, outcomes and policy types.
pub mod order;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Zeroizing secret strings.
pub mod secret_string;
/// Standard-specific types and encodings.
pub mod standards;
/// Storage namespaces.
pub mod storage;
/// Address conversion and formatting helpers.
pub mod utils;

pub use discovery::ListenerConfig;
pub use networks::{
	global_registry, init_registry, reset_registry, ChainFamily, NetworkConfig, NetworkRegistry,
	RegistryError,
};
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use standards::{FillInstruction, Output, ResolvedCrossChainOrder};
pub use storage::StorageKey;
pub use utils::{truncate_id, with_0x_prefix, without_0x_prefix};
