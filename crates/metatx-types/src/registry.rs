//! Registry trait for self-registering implementations.
//!
//! Account and delivery implementations each expose a `Registry` struct
//! naming the key they are configured under and the factory that builds them.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "local" for `[account.implementations.local]` or "evm_alloy" for
	/// `[delivery.implementations.evm_alloy]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function that builds this implementation from its
	/// configuration table.
	fn factory() -> Self::Factory;
}
