//! Configuration for the meta-transaction relay.
//!
//! Configuration is a TOML document with `${VAR}` / `${VAR:-default}`
//! environment expansion, validated right after parsing. It names the
//! network the relay targets, how request digests are built, the deployed
//! contract addresses per network, and which account and delivery
//! implementations to construct.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["networks.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

#[cfg(feature = "testing")]
pub mod builders {
	pub mod config;
}
mod loader;

use metatx_types::utils::parse_u256;
use metatx_types::{
	networks::deserialize_networks, DigestEncoding, ForwarderDomain, NetworkConfig,
	NetworksConfig, VConvention, U256,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// How requests are built and signed.
	pub relay: RelayConfig,
	/// EIP-712 domain name and version of the forwarder.
	#[serde(default)]
	pub domain: DomainConfig,
	/// RPC endpoints and deployed contracts per chain id.
	#[serde(deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Configuration for account management.
	pub account: AccountConfig,
	/// Configuration for delivery mechanisms.
	pub delivery: DeliveryConfig,
}

/// Request building and signing options.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
	/// Chain id the relay targets; must be a key of `networks`.
	pub network_id: u64,
	/// Digest the forwarder recomputes. Defaults to EIP-712.
	#[serde(default)]
	pub encoding: DigestEncoding,
	/// Encoding of the signature's `v` byte.
	#[serde(default)]
	pub v_convention: VConvention,
	/// Gas limit placed in each forward request.
	#[serde(default = "default_gas")]
	pub gas: u64,
	/// Recover the signer locally before submitting.
	#[serde(default = "default_self_verify")]
	pub self_verify: bool,
	/// Ask the forwarder's `verify` view before every `execute`.
	#[serde(default)]
	pub remote_verify: bool,
	/// Wei sent to a fresh user wallet by `relay --fund`, decimal or 0x-hex.
	#[serde(default = "default_funding_wei")]
	pub funding_wei: String,
}

fn default_gas() -> u64 {
	1_000_000
}

fn default_self_verify() -> bool {
	true
}

/// 0.01 ether.
fn default_funding_wei() -> String {
	"10000000000000000".to_string()
}

/// EIP-712 domain name and version. Chain id and verifying contract come
/// from the relay network.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainConfig {
	#[serde(default = "default_domain_name")]
	pub name: String,
	#[serde(default = "default_domain_version")]
	pub version: String,
}

impl Default for DomainConfig {
	fn default() -> Self {
		Self {
			name: default_domain_name(),
			version: default_domain_version(),
		}
	}
}

fn default_domain_name() -> String {
	metatx_types::utils::NAME_MINIMAL_FORWARDER.to_string()
}

fn default_domain_version() -> String {
	metatx_types::utils::VERSION_MINIMAL_FORWARDER.to_string()
}

/// Configuration for account management.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of account implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
}

/// Configuration for delivery mechanisms.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of delivery implementation names to their configurations.
	/// Each implementation has its own configuration format stored as raw TOML values.
	pub implementations: HashMap<String, toml::Value>,
	/// Minimum number of confirmations required for transactions.
	#[serde(default = "default_confirmations")]
	pub min_confirmations: u64,
}

fn default_confirmations() -> u64 {
	1
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)));
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Network entry for `relay.network_id`.
	pub fn relay_network(&self) -> Result<&NetworkConfig, ConfigError> {
		self.networks.get(&self.relay.network_id).ok_or_else(|| {
			ConfigError::Validation(format!(
				"Relay network {} not found in networks config",
				self.relay.network_id
			))
		})
	}

	/// EIP-712 domain of the relay network's forwarder.
	pub fn forwarder_domain(&self) -> Result<ForwarderDomain, ConfigError> {
		let network = self.relay_network()?;
		Ok(ForwarderDomain::new(
			self.domain.name.clone(),
			self.domain.version.clone(),
			self.relay.network_id,
			network.forwarder_address,
		))
	}

	/// `relay.funding_wei` as an amount.
	pub fn funding_amount(&self) -> Result<U256, ConfigError> {
		parse_u256(&self.relay.funding_wei).map_err(|e| {
			ConfigError::Validation(format!("Invalid relay.funding_wei: {}", e))
		})
	}

	/// Validates cross-section invariants after deserialization.
	fn validate(&self) -> Result<(), ConfigError> {
		// Relay
		self.relay_network()?;
		if self.relay.gas == 0 {
			return Err(ConfigError::Validation(
				"relay.gas must be greater than 0".into(),
			));
		}
		self.funding_amount()?;

		// Domain
		if self.domain.name.trim().is_empty() {
			return Err(ConfigError::Validation("domain.name cannot be empty".into()));
		}
		if self.domain.version.trim().is_empty() {
			return Err(ConfigError::Validation(
				"domain.version cannot be empty".into(),
			));
		}

		// Networks
		for (chain_id, network) in &self.networks {
			if network.rpc_url.trim().is_empty() {
				return Err(ConfigError::Validation(format!(
					"Network {} must have rpc_url",
					chain_id
				)));
			}
		}

		// Account
		if !self
			.account
			.implementations
			.contains_key(&self.account.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary account '{}' not found in implementations",
				self.account.primary
			)));
		}

		// Delivery
		if !self
			.delivery
			.implementations
			.contains_key(&self.delivery.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary delivery '{}' not found in implementations",
				self.delivery.primary
			)));
		}
		if self.delivery.min_confirmations == 0 {
			return Err(ConfigError::Validation(
				"min_confirmations must be at least 1".into(),
			));
		}
		if self.delivery.min_confirmations > 100 {
			return Err(ConfigError::Validation(
				"min_confirmations cannot exceed 100".into(),
			));
		}
		self.validate_delivery_coverage()?;

		Ok(())
	}

	/// Every network a delivery implementation serves must be configured, and
	/// the primary implementation must serve the relay network.
	fn validate_delivery_coverage(&self) -> Result<(), ConfigError> {
		for (impl_name, impl_config) in &self.delivery.implementations {
			let Some(network_ids) = impl_config.get("network_ids").and_then(|v| v.as_array())
			else {
				continue;
			};

			let mut covers_relay = false;
			for value in network_ids {
				let network_id = value.as_integer().ok_or_else(|| {
					ConfigError::Validation(format!(
						"Invalid network_id in delivery '{}'",
						impl_name
					))
				})? as u64;

				if !self.networks.contains_key(&network_id) {
					return Err(ConfigError::Validation(format!(
						"Delivery '{}' references network {} which doesn't exist in networks config",
						impl_name, network_id
					)));
				}
				covers_relay |= network_id == self.relay.network_id;
			}

			if *impl_name == self.delivery.primary && !covers_relay {
				return Err(ConfigError::Validation(format!(
					"Primary delivery '{}' does not serve relay network {}",
					impl_name, self.relay.network_id
				)));
			}
		}

		Ok(())
	}
}

/// Parses configuration from a TOML string.
///
/// Environment variables are resolved and the configuration is validated
/// after parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
