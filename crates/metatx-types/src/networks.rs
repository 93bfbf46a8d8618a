//! Network configuration types.
//!
//! This module defines the per-network settings the relay needs: the RPC
//! endpoint and the deployed forwarder and text storage addresses.

use alloy_primitives::Address;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `rpc_url` - The HTTP(S) RPC endpoint for blockchain interaction
/// * `forwarder_address` - Address of the deployed MinimalForwarder
/// * `text_storage_address` - Address of the deployed TextStorage contract
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	pub rpc_url: String,
	pub forwarder_address: Address,
	pub text_storage_address: Address,
}

/// Networks configuration mapping chain IDs to their configurations.
///
/// Chain IDs are string keys in TOML (tables cannot have numeric keys)
/// and are converted to u64 on load.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Helper function to deserialize network configurations from TOML.
///
/// # Errors
///
/// Returns a deserialization error if:
/// - A chain ID key cannot be parsed as a u64
/// - The underlying network configuration is invalid
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}
