//! File-based storage backend.
//!
//! One file per key under a base directory. Writes go to a temporary file that
//! is renamed over the target, so a crash never leaves a torn value behind.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use solver_types::ImplementationRegistry;
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_STORAGE_PATH: &str = "./data/storage";

pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Maps a key to a filesystem-safe path.
	fn file_path(&self, key: &str) -> PathBuf {
		let safe_key = key.replace(['/', ':', '\\'], "_");
		self.base_path.join(format!("{}.json", safe_key))
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		tracing::trace!(key = key, path = ?path, "Stored value");
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.file_path(key))
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	let storage_path = match config.get("storage_path") {
		None => DEFAULT_STORAGE_PATH,
		Some(value) => value.as_str().ok_or_else(|| {
			StorageError::Configuration("storage_path must be a string".to_string())
		})?,
	};

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ProgressStore, StorageService};
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_file_operations() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().to_path_buf());

		assert!(matches!(
			storage.get_bytes("last_indexed_block:base").await,
			Err(StorageError::NotFound)
		));

		storage
			.set_bytes("last_indexed_block:base", b"42".to_vec())
			.await
			.unwrap();
		assert!(dir.path().join("last_indexed_block_base.json").exists());
		assert!(!dir.path().join("last_indexed_block_base.tmp").exists());
		assert_eq!(
			storage.get_bytes("last_indexed_block:base").await.unwrap(),
			b"42"
		);

		storage.delete("last_indexed_block:base").await.unwrap();
		assert!(!storage.exists("last_indexed_block:base").await.unwrap());
		storage.delete("last_indexed_block:base").await.unwrap();
	}

	#[tokio::test]
	async fn test_progress_survives_restart() {
		let dir = TempDir::new().unwrap();
		let config: toml::Value = toml::from_str(&format!(
			"storage_path = \"{}\"",
			dir.path().display()
		))
		.unwrap();

		let first = StorageService::new(create_storage(&config).unwrap());
		first.set_last_indexed_block("starknet", 900).await.unwrap();
		drop(first);

		let second = StorageService::new(create_storage(&config).unwrap());
		assert_eq!(
			second.last_indexed_block("starknet").await.unwrap(),
			Some(900)
		);
	}

	#[test]
	fn test_rejects_non_string_path() {
		let config: toml::Value = toml::from_str("storage_path = 5").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
