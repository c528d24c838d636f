//! Local private-key account.

use crate::{AccountError, AccountFactory, AccountInterface, AccountRegistry};
use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use solver_types::{with_0x_prefix, ImplementationRegistry, SecretString};

/// Account backed by a hex private key held in process memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let key = with_0x_prefix(private_key.expose_secret().trim());
		let signer = key
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(format!("Invalid private key: {}", e)))?;
		Ok(Self { signer })
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	fn signer(&self) -> PrivateKeySigner {
		self.signer.clone()
	}
}

/// Factory function to create a local account from configuration.
///
/// Configuration parameters:
/// - `private_key`: hex private key, usually `${SOLVER_PRIVATE_KEY}`
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	Ok(Box::new(LocalWallet::new(&SecretString::from(private_key))?))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	// Well-known development key (anvil account 0)
	const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[tokio::test]
	async fn test_address_from_key_without_prefix() {
		let config: toml::Value = toml::from_str(&format!("private_key = \"{}\"", DEV_KEY)).unwrap();
		let account = create_account(&config).unwrap();

		let address = account.address().await.unwrap();
		assert_eq!(
			format!("{:?}", address).to_lowercase(),
			"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
		);

		let service = crate::AccountService::new(account);
		assert_eq!(service.get_address().await.unwrap(), address);
		assert_eq!(service.signer().address(), address);
	}

	#[test]
	fn test_missing_or_bad_key() {
		let empty = toml::Value::Table(toml::map::Map::new());
		assert!(matches!(
			create_account(&empty),
			Err(AccountError::InvalidKey(_))
		));

		let bad: toml::Value = toml::from_str("private_key = \"0x1234\"").unwrap();
		assert!(create_account(&bad).is_err());
	}
}
