//! Storage module for the solver system.
//!
//! Provides a byte-level key/value backend abstraction with file and in-memory
//! implementations, a typed JSON service on top of it, and the progress store
//! chain listeners use to persist the last fully processed block.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use solver_types::{ImplementationRegistry, StorageKey};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level key/value interface every storage backend implements.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes, replacing any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// Typed storage over a backend, serializing values as JSON under
/// `namespace:id` keys.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(&key, bytes).await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let key = format!("{}:{}", namespace, id);
		let bytes = self.backend.get_bytes(&key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		let key = format!("{}:{}", namespace, id);
		self.backend.exists(&key).await
	}
}

/// Persisted per-chain listener progress.
///
/// Implemented over [`StorageService`] for production and by test doubles in
/// the discovery crate.
#[async_trait]
pub trait ProgressStore: Send + Sync {
	/// Returns the last fully processed block for a chain, if any.
	async fn last_indexed_block(&self, chain_name: &str) -> Result<Option<u64>, StorageError>;

	/// Records the last fully processed block for a chain.
	async fn set_last_indexed_block(&self, chain_name: &str, block: u64)
		-> Result<(), StorageError>;
}

#[async_trait]
impl ProgressStore for StorageService {
	async fn last_indexed_block(&self, chain_name: &str) -> Result<Option<u64>, StorageError> {
		match self
			.retrieve::<u64>(StorageKey::LastIndexedBlock.as_str(), chain_name)
			.await
		{
			Ok(block) => Ok(Some(block)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn set_last_indexed_block(
		&self,
		chain_name: &str,
		block: u64,
	) -> Result<(), StorageError> {
		self.store(StorageKey::LastIndexedBlock.as_str(), chain_name, &block)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryStorage;

	#[tokio::test]
	async fn test_progress_round_trip() {
		let service = StorageService::new(Box::new(MemoryStorage::new()));
		assert_eq!(service.last_indexed_block("optimism").await.unwrap(), None);

		service.set_last_indexed_block("optimism", 10).await.unwrap();
		service.set_last_indexed_block("optimism", 20).await.unwrap();
		service.set_last_indexed_block("base", 5).await.unwrap();

		assert_eq!(service.last_indexed_block("optimism").await.unwrap(), Some(20));
		assert_eq!(service.last_indexed_block("base").await.unwrap(), Some(5));
		assert!(service
			.exists(StorageKey::LastIndexedBlock.as_str(), "base")
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn test_corrupt_progress_is_an_error() {
		let backend = MemoryStorage::new();
		backend
			.set_bytes("last_indexed_block:optimism", b"not json".to_vec())
			.await
			.unwrap();
		let service = StorageService::new(Box::new(backend));
		assert!(matches!(
			service.last_indexed_block("optimism").await,
			Err(StorageError::Serialization(_))
		));
	}
}
