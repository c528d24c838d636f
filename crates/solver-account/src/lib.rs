//! Account management module for the solver.
//!
//! Provides the signing identity used on EVM chains. Starknet accounts are
//! supplied to the delivery layer separately.

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use solver_types::ImplementationRegistry;
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The configured key is missing or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Interface every account implementation provides.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Address that submits fill and settle transactions.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Transaction signer handed to EVM chain clients.
	fn signer(&self) -> PrivateKeySigner;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service wrapping the configured account implementation.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	pub fn signer(&self) -> PrivateKeySigner {
		self.implementation.signer()
	}
}
