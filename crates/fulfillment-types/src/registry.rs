//! Registry trait for self-registering implementations.
//!
//! Storage backends and the carrier, commerce and insight integrations each
//! expose a `Registry` struct so the service can pick an implementation by
//! the name used in the TOML configuration.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "memory" for `storage.implementations.memory` or "fedex" for
	/// `carrier.implementations.fedex`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
