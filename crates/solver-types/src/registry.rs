//! Registry trait for self-registering implementations.

/// Implemented by every pluggable backend (storage, account, pricing) so the
/// service can map the name used in configuration to a factory.
pub trait ImplementationRegistry {
	/// Name used in configuration, e.g. `"file"` for `[storage.implementations.file]`.
	const NAME: &'static str;

	/// Factory function type of the owning crate.
	type Factory;

	fn factory() -> Self::Factory;
}
