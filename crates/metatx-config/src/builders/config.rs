//! Configuration builder for tests and local development.
//!
//! Produces a valid single-network `Config` backed by the simulated
//! forwarder, so callers can exercise the full relay flow without a node.

use crate::{AccountConfig, Config, DeliveryConfig, DomainConfig, RelayConfig};
use metatx_types::{Address, DigestEncoding, NetworkConfig, VConvention};
use std::collections::HashMap;

/// Hardhat account #0, used as the relayer key by default.
pub const DEFAULT_PRIVATE_KEY: &str =
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	network_id: u64,
	rpc_url: String,
	forwarder: Address,
	text_storage: Address,
	encoding: DigestEncoding,
	v_convention: VConvention,
	gas: u64,
	self_verify: bool,
	remote_verify: bool,
	funding_wei: String,
	min_confirmations: u64,
	private_key: String,
	delivery_primary: String,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		Self {
			network_id: 31337,
			rpc_url: "http://localhost:8545".to_string(),
			forwarder: Address::repeat_byte(0x0f),
			text_storage: Address::repeat_byte(0x57),
			encoding: DigestEncoding::Eip712,
			v_convention: VConvention::Offset27,
			gas: 1_000_000,
			self_verify: true,
			remote_verify: false,
			funding_wei: "10000000000000000".to_string(),
			min_confirmations: 1,
			private_key: DEFAULT_PRIVATE_KEY.to_string(),
			delivery_primary: "simulated".to_string(),
		}
	}

	pub fn network_id(mut self, network_id: u64) -> Self {
		self.network_id = network_id;
		self
	}

	pub fn rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
		self.rpc_url = rpc_url.into();
		self
	}

	pub fn forwarder(mut self, forwarder: Address) -> Self {
		self.forwarder = forwarder;
		self
	}

	pub fn text_storage(mut self, text_storage: Address) -> Self {
		self.text_storage = text_storage;
		self
	}

	pub fn encoding(mut self, encoding: DigestEncoding) -> Self {
		self.encoding = encoding;
		self
	}

	pub fn v_convention(mut self, v_convention: VConvention) -> Self {
		self.v_convention = v_convention;
		self
	}

	pub fn gas(mut self, gas: u64) -> Self {
		self.gas = gas;
		self
	}

	pub fn self_verify(mut self, self_verify: bool) -> Self {
		self.self_verify = self_verify;
		self
	}

	pub fn remote_verify(mut self, remote_verify: bool) -> Self {
		self.remote_verify = remote_verify;
		self
	}

	pub fn funding_wei(mut self, funding_wei: impl Into<String>) -> Self {
		self.funding_wei = funding_wei.into();
		self
	}

	/// Sets the minimum confirmations for delivery.
	pub fn min_confirmations(mut self, confirmations: u64) -> Self {
		self.min_confirmations = confirmations;
		self
	}

	/// Sets the relayer key of the local account.
	pub fn private_key(mut self, private_key: impl Into<String>) -> Self {
		self.private_key = private_key.into();
		self
	}

	/// Selects `"simulated"` (default) or `"evm_alloy"` delivery.
	pub fn delivery_primary(mut self, primary: impl Into<String>) -> Self {
		self.delivery_primary = primary.into();
		self
	}

	/// Builds the `Config` with the configured values.
	pub fn build(self) -> Config {
		let network_ids = toml::Value::Array(vec![toml::Value::Integer(self.network_id as i64)]);

		let mut delivery_table = toml::Table::new();
		delivery_table.insert("network_ids".to_string(), network_ids);
		if self.delivery_primary == "simulated" {
			delivery_table.insert(
				"encoding".to_string(),
				toml::Value::String(self.encoding.to_string()),
			);
		}

		let mut account_table = toml::Table::new();
		account_table.insert(
			"private_key".to_string(),
			toml::Value::String(self.private_key),
		);

		let mut networks = HashMap::new();
		networks.insert(
			self.network_id,
			NetworkConfig {
				rpc_url: self.rpc_url,
				forwarder_address: self.forwarder,
				text_storage_address: self.text_storage,
			},
		);

		Config {
			relay: RelayConfig {
				network_id: self.network_id,
				encoding: self.encoding,
				v_convention: self.v_convention,
				gas: self.gas,
				self_verify: self.self_verify,
				remote_verify: self.remote_verify,
				funding_wei: self.funding_wei,
			},
			domain: DomainConfig::default(),
			networks,
			account: AccountConfig {
				primary: "local".to_string(),
				implementations: HashMap::from([(
					"local".to_string(),
					toml::Value::Table(account_table),
				)]),
			},
			delivery: DeliveryConfig {
				primary: self.delivery_primary.clone(),
				implementations: HashMap::from([(
					self.delivery_primary,
					toml::Value::Table(delivery_table),
				)]),
				min_confirmations: self.min_confirmations,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_built_config_is_consistent() {
		let config = ConfigBuilder::new()
			.network_id(11155111)
			.encoding(DigestEncoding::Packed)
			.build();

		assert!(config.validate().is_ok());
		assert_eq!(config.forwarder_domain().unwrap().chain_id, 11155111);
		assert_eq!(
			config.delivery.implementations["simulated"]
				.get("encoding")
				.and_then(|v| v.as_str()),
			Some("packed")
		);
	}
}
