//! Storage-related types for the solver system.

/// Namespaces of persisted solver data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Last block fully processed by a chain listener, keyed by chain name.
	LastIndexedBlock,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::LastIndexedBlock => "last_indexed_block",
		}
	}
}
