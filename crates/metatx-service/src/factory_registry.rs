//! Dynamic factory registry for relay implementations.
//!
//! Collects every account and delivery factory the crates export so the
//! implementations named in the configuration can be instantiated by name.

use metatx_account::AccountFactory;
use metatx_config::Config;
use metatx_core::{Relayer, RelayerBuilder, RelayerFactories};
use metatx_delivery::DeliveryFactory;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub account: HashMap<String, AccountFactory>,
	pub delivery: HashMap<String, DeliveryFactory>,
}

impl FactoryRegistry {
	pub fn new() -> Self {
		Self {
			account: HashMap::new(),
			delivery: HashMap::new(),
		}
	}

	pub fn register_account(&mut self, name: impl Into<String>, factory: AccountFactory) {
		self.account.insert(name.into(), factory);
	}

	pub fn register_delivery(&mut self, name: impl Into<String>, factory: DeliveryFactory) {
		self.delivery.insert(name.into(), factory);
	}
}

static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, populating it on first use.
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in metatx_account::get_all_implementations() {
			tracing::debug!("Registering account implementation: {}", name);
			registry.register_account(name, factory);
		}

		for (name, factory) in metatx_delivery::get_all_implementations() {
			tracing::debug!("Registering delivery implementation: {}", name);
			registry.register_delivery(name, factory);
		}

		registry
	})
}

/// Picks the factories for every implementation the config names.
macro_rules! build_factories {
	($registry:expr, $config_impls:expr, $registry_field:ident, $type_name:literal) => {{
		let mut factories = HashMap::new();
		for name in $config_impls.keys() {
			if let Some(factory) = $registry.$registry_field.get(name) {
				factories.insert(name.clone(), *factory);
			} else {
				let mut available: Vec<_> = $registry.$registry_field.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown {} implementation '{}'. Available: [{}]",
					$type_name,
					name,
					available.join(", ")
				)
				.into());
			}
		}
		factories
	}};
}

/// Build a relayer using the registry and config.
pub async fn build_relayer_from_config(
	config: Config,
) -> Result<Relayer, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let account_factories =
		build_factories!(registry, config.account.implementations, account, "account");
	let delivery_factories = build_factories!(
		registry,
		config.delivery.implementations,
		delivery,
		"delivery"
	);

	let factories = RelayerFactories {
		account_factories,
		delivery_factories,
	};

	Ok(RelayerBuilder::new(config).build(factories).await?)
}
