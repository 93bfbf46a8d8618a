//! Builder pattern for constructing a relayer.
//!
//! Composes a [`Relayer`] from the loaded configuration and factory functions
//! for the account and delivery implementations it names.

use crate::engine::Relayer;
use crate::request::MetaTransactionRequestBuilder;
use metatx_account::{AccountError, AccountInterface, AccountService};
use metatx_config::Config;
use metatx_delivery::{DeliveryError, DeliveryInterface, DeliveryService};
use metatx_types::{NetworksConfig, SecretString, U256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during relayer construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Factory functions keyed by implementation name.
pub struct RelayerFactories<AF, DF> {
	pub account_factories: HashMap<String, AF>,
	pub delivery_factories: HashMap<String, DF>,
}

/// Builder for constructing a [`Relayer`] with pluggable implementations.
pub struct RelayerBuilder {
	config: Config,
}

impl RelayerBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the relayer using the primary account and every configured
	/// delivery implementation.
	///
	/// Delivery implementations are created with the primary account's key.
	/// When two implementations list the same network, the primary wins.
	pub async fn build<AF, DF>(
		self,
		factories: RelayerFactories<AF, DF>,
	) -> Result<Relayer, BuilderError>
	where
		AF: Fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>,
		DF: Fn(
			&toml::Value,
			&NetworksConfig,
			&SecretString,
		) -> Result<Box<dyn DeliveryInterface>, DeliveryError>,
	{
		let primary_account = self.config.account.primary.as_str();
		let account_config = self
			.config
			.account
			.implementations
			.get(primary_account)
			.ok_or_else(|| {
				BuilderError::Config(format!(
					"Primary account '{}' has no configuration",
					primary_account
				))
			})?;
		let account_factory = factories
			.account_factories
			.get(primary_account)
			.ok_or_else(|| {
				BuilderError::MissingComponent(format!(
					"account implementation '{}'",
					primary_account
				))
			})?;

		let account = match account_factory(account_config) {
			Ok(implementation) => Arc::new(AccountService::new(implementation)),
			Err(e) => {
				tracing::error!(
					component = "account",
					implementation = %primary_account,
					error = %e,
					"Failed to create account implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create account implementation '{}': {}",
					primary_account, e
				)));
			},
		};

		let relayer_address = account
			.get_address()
			.await
			.map_err(|e| BuilderError::Config(format!("Failed to get relayer address: {}", e)))?;
		tracing::info!(component = "account", implementation = %primary_account, address = %relayer_address, "Loaded");

		let private_key = account.get_private_key();

		// Primary last so its networks override the rest.
		let primary_delivery = self.config.delivery.primary.as_str();
		let mut names: Vec<&String> = self.config.delivery.implementations.keys().collect();
		names.sort();
		names.sort_by_key(|name| name.as_str() == primary_delivery);

		let mut providers: HashMap<u64, Arc<dyn DeliveryInterface>> = HashMap::new();
		for name in names {
			let Some(factory) = factories.delivery_factories.get(name) else {
				if name.as_str() == primary_delivery {
					return Err(BuilderError::MissingComponent(format!(
						"delivery implementation '{}'",
						name
					)));
				}
				tracing::warn!(component = "delivery", implementation = %name, "No factory registered, skipping");
				continue;
			};
			let config = &self.config.delivery.implementations[name];

			let network_ids: Vec<u64> = config
				.get("network_ids")
				.and_then(|v| v.as_array())
				.ok_or_else(|| {
					BuilderError::Config(format!(
						"Delivery implementation '{}' missing network_ids configuration",
						name
					))
				})?
				.iter()
				.filter_map(|v| v.as_integer())
				.map(|id| id as u64)
				.collect();

			let implementation: Arc<dyn DeliveryInterface> =
				match factory(config, &self.config.networks, &private_key) {
					Ok(implementation) => implementation.into(),
					Err(e) => {
						tracing::error!(
							component = "delivery",
							implementation = %name,
							error = %e,
							"Failed to create delivery implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create delivery implementation '{}': {}",
							name, e
						)));
					},
				};

			for network_id in network_ids {
				providers.insert(network_id, implementation.clone());
				tracing::info!(component = "delivery", implementation = %name, network_id, "Loaded");
			}
		}

		let relay_network_id = self.config.relay.network_id;
		if !providers.contains_key(&relay_network_id) {
			return Err(BuilderError::MissingComponent(format!(
				"delivery for relay network {}",
				relay_network_id
			)));
		}

		let delivery = Arc::new(DeliveryService::new(
			providers,
			self.config.delivery.min_confirmations,
		));

		let domain = self
			.config
			.forwarder_domain()
			.map_err(|e| BuilderError::Config(e.to_string()))?;
		let text_storage = self
			.config
			.relay_network()
			.map_err(|e| BuilderError::Config(e.to_string()))?
			.text_storage_address;

		let builder = MetaTransactionRequestBuilder::new(domain)
			.with_encoding(self.config.relay.encoding)
			.with_v_convention(self.config.relay.v_convention)
			.with_self_verify(self.config.relay.self_verify);

		tracing::info!(
			chain_id = relay_network_id,
			forwarder = %builder.domain().verifying_contract,
			encoding = %self.config.relay.encoding,
			"Relayer ready"
		);

		Ok(
			Relayer::new(builder, delivery, account, text_storage)
				.with_gas(U256::from(self.config.relay.gas))
				.with_remote_verify(self.config.relay.remote_verify),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use metatx_account::implementations::local::LocalWallet;
	use metatx_account::AccountFactory;
	use metatx_config::builders::config::ConfigBuilder;
	use metatx_delivery::DeliveryFactory;
	use metatx_types::DigestEncoding;

	fn factories() -> RelayerFactories<AccountFactory, DeliveryFactory> {
		RelayerFactories {
			account_factories: metatx_account::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			delivery_factories: metatx_delivery::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	#[tokio::test]
	async fn test_build_from_config_and_relay() {
		let config = ConfigBuilder::new()
			.network_id(11155111)
			.encoding(DigestEncoding::Packed)
			.gas(500_000)
			.build();

		let relayer = RelayerBuilder::new(config)
			.build(factories())
			.await
			.unwrap();

		assert_eq!(relayer.chain_id(), 11155111);
		assert_eq!(relayer.builder().encoding(), DigestEncoding::Packed);
		assert_eq!(
			relayer.relayer_address().await.unwrap(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);

		let user = LocalWallet::random();
		let report = relayer.store_text(&user, "hello").await.unwrap();
		assert!(report.outcome.is_confirmed());
		assert_eq!(report.signed.request().gas, U256::from(500_000u64));
	}

	#[tokio::test]
	async fn test_remote_verify_wired_from_config() {
		let config = ConfigBuilder::new().remote_verify(true).build();
		let relayer = RelayerBuilder::new(config)
			.build(factories())
			.await
			.unwrap();

		let report = relayer
			.store_text(&LocalWallet::random(), "checked")
			.await
			.unwrap();
		assert!(report.outcome.is_confirmed());
		assert!(relayer.verifies_remotely());
	}

	#[tokio::test]
	async fn test_missing_delivery_factory() {
		let config = ConfigBuilder::new().build();
		let mut factories = factories();
		factories.delivery_factories.remove("simulated");

		let result = RelayerBuilder::new(config).build(factories).await;
		assert!(matches!(result, Err(BuilderError::MissingComponent(_))));
	}

	#[tokio::test]
	async fn test_invalid_account_key() {
		let config = ConfigBuilder::new().private_key("0x1234").build();

		let result = RelayerBuilder::new(config).build(factories()).await;
		assert!(matches!(result, Err(BuilderError::Config(_))));
	}
}
