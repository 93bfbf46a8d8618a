//! Alloy-based delivery over JSON-RPC.
//!
//! Talks to a deployed `MinimalForwarder` and `TextStorage` through an HTTP
//! provider whose wallet is the relayer key. Calls and return values are
//! encoded with the `sol!` bindings from `metatx_types::contracts`.

use crate::{DeliveryError, DeliveryInterface};
use alloy_network::EthereumWallet;
use alloy_primitives::B256;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use alloy_transport::TransportError;
use alloy_transport_http::Http;
use async_trait::async_trait;
use metatx_types::contracts::{IMinimalForwarder, ITextStorage};
use metatx_types::{
	without_0x_prefix, Address, Bytes, ConfigSchema, EventLog, Field, FieldType,
	ForwardRequest, NetworksConfig, Schema, SecretString, TransactionHash, TransactionReceipt,
	ValidationError, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Allowance per requested confirmation before giving up.
const SECONDS_PER_CONFIRMATION: u64 = 30;
const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// Alloy-based EVM delivery implementation.
///
/// One instance serves every network listed in its `network_ids`, each with
/// its own provider. The relayer wallet signs every outgoing transaction.
pub struct AlloyDelivery {
	providers: HashMap<u64, HttpProvider>,
	relayer: Address,
	poll_interval: Duration,
}

impl AlloyDelivery {
	/// Creates a provider per network, all sharing the relayer signer.
	pub fn new(
		network_ids: Vec<u64>,
		networks: &NetworksConfig,
		signer: PrivateKeySigner,
		poll_interval: Duration,
	) -> Result<Self, DeliveryError> {
		if network_ids.is_empty() {
			return Err(DeliveryError::Network(
				"At least one network_id must be specified".to_string(),
			));
		}

		let relayer = signer.address();
		let mut providers = HashMap::new();

		for network_id in &network_ids {
			let network = networks.get(network_id).ok_or_else(|| {
				DeliveryError::Network(format!("Network {} not found in configuration", network_id))
			})?;

			let url = network.rpc_url.parse().map_err(|e| {
				DeliveryError::Network(format!("Invalid RPC URL for network {}: {}", network_id, e))
			})?;

			let wallet = EthereumWallet::from(signer.clone().with_chain_id(Some(*network_id)));

			let provider = ProviderBuilder::new()
				.with_recommended_fillers()
				.wallet(wallet)
				.on_http(url);

			provider.client().set_poll_interval(poll_interval);

			providers.insert(*network_id, Arc::new(provider) as HttpProvider);
		}

		tracing::info!(relayer = %relayer, networks = ?network_ids, "Alloy delivery ready");

		Ok(Self {
			providers,
			relayer,
			poll_interval,
		})
	}

	/// Address the relayer wallet sends from.
	pub fn relayer(&self) -> Address {
		self.relayer
	}

	fn get_provider(&self, chain_id: u64) -> Result<&HttpProvider, DeliveryError> {
		self.providers.get(&chain_id).ok_or_else(|| {
			DeliveryError::Network(format!("No provider configured for chain ID {}", chain_id))
		})
	}

	/// Runs an `eth_call` and returns the raw return data.
	async fn call(
		&self,
		chain_id: u64,
		to: Address,
		input: Vec<u8>,
	) -> Result<Bytes, DeliveryError> {
		let provider = self.get_provider(chain_id)?;
		let request = TransactionRequest::default().to(to).input(input.into());

		provider
			.call(&request)
			.await
			.map_err(|e| classify_rpc_error("eth_call failed", e))
	}

	/// Sends a transaction from the relayer wallet.
	async fn send(
		&self,
		chain_id: u64,
		request: TransactionRequest,
	) -> Result<TransactionHash, DeliveryError> {
		let provider = self.get_provider(chain_id)?;

		let pending_tx = provider
			.send_transaction(request)
			.await
			.map_err(|e| classify_rpc_error("Failed to send transaction", e))?;

		let hash = TransactionHash(*pending_tx.tx_hash());
		tracing::info!(tx_hash = %hash, chain_id, "Submitted transaction");
		Ok(hash)
	}
}

/// Splits node refusals from transport failures.
///
/// A JSON-RPC error response (revert during estimation, nonce too low,
/// insufficient funds) is the node speaking and is passed through as-is,
/// together with the revert data when the node attached any.
fn classify_rpc_error(context: &str, error: TransportError) -> DeliveryError {
	match error.as_error_resp() {
		Some(payload) => DeliveryError::Rejected {
			message: payload.message.to_string(),
			data: payload.as_revert_data(),
		},
		None => DeliveryError::Network(format!("{}: {}", context, error)),
	}
}

fn convert_receipt(receipt: &alloy_rpc_types::TransactionReceipt) -> TransactionReceipt {
	let logs = receipt
		.inner
		.logs()
		.iter()
		.map(|log| EventLog {
			address: log.inner.address,
			topics: log.inner.data.topics().to_vec(),
			data: log.inner.data.data.clone(),
		})
		.collect();

	TransactionReceipt {
		hash: TransactionHash(receipt.transaction_hash),
		block_number: receipt.block_number.unwrap_or(0),
		success: receipt.status(),
		logs,
	}
}

/// Configuration schema for Alloy delivery provider.
pub struct AlloyDeliverySchema;

impl AlloyDeliverySchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		AlloyDeliverySchema.validate(config)
	}
}

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			// Required fields
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)
			.with_validator(|value| match value.as_array() {
				Some(arr) if arr.is_empty() => Err("network_ids cannot be empty".to_string()),
				Some(_) => Ok(()),
				None => Err("network_ids must be an array".to_string()),
			})],
			// Optional fields
			vec![Field::new("poll_interval_ms", FieldType::Integer {
				min: Some(100),
				max: Some(60_000),
			})],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(AlloyDeliverySchema)
	}

	async fn get_forwarder_nonce(
		&self,
		chain_id: u64,
		forwarder: Address,
		from: Address,
	) -> Result<U256, DeliveryError> {
		let input = IMinimalForwarder::getNonceCall { from }.abi_encode();
		let output = self.call(chain_id, forwarder, input).await?;

		let decoded = IMinimalForwarder::getNonceCall::abi_decode_returns(&output, true)
			.map_err(|e| DeliveryError::Network(format!("Invalid getNonce response: {}", e)))?;
		Ok(decoded._0)
	}

	async fn verify_forward_request(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<bool, DeliveryError> {
		let input = IMinimalForwarder::verifyCall {
			req: request.into(),
			signature: signature.clone(),
		}
		.abi_encode();
		let output = self.call(chain_id, forwarder, input).await?;

		let decoded = IMinimalForwarder::verifyCall::abi_decode_returns(&output, true)
			.map_err(|e| DeliveryError::Network(format!("Invalid verify response: {}", e)))?;
		Ok(decoded._0)
	}

	async fn execute(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<TransactionHash, DeliveryError> {
		let input = IMinimalForwarder::executeCall {
			req: request.into(),
			signature: signature.clone(),
		}
		.abi_encode();

		let tx = TransactionRequest::default()
			.to(forwarder)
			.value(request.value)
			.input(input.into());

		tracing::debug!(
			chain_id,
			forwarder = %forwarder,
			from = %request.from,
			nonce = %request.nonce,
			"Sending execute"
		);
		self.send(chain_id, tx).await
	}

	async fn wait_for_confirmation(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let tx_hash: B256 = hash.0;
		let timeout_seconds = (confirmations * SECONDS_PER_CONFIRMATION)
			.max(SECONDS_PER_CONFIRMATION)
			.min(MAX_TIMEOUT_SECONDS);
		let max_wait_time = Duration::from_secs(timeout_seconds);
		let start_time = tokio::time::Instant::now();

		tracing::info!(
			tx_hash = %hash,
			"Waiting for {} confirmations (timeout: {}s)",
			confirmations,
			timeout_seconds
		);

		let provider = self.get_provider(chain_id)?;

		loop {
			if start_time.elapsed() > max_wait_time {
				return Err(DeliveryError::Network(format!(
					"Timeout waiting for {} confirmations after {} seconds",
					confirmations,
					max_wait_time.as_secs()
				)));
			}

			let receipt = match provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => receipt,
				Ok(None) => {
					tokio::time::sleep(self.poll_interval).await;
					continue;
				},
				Err(e) => {
					return Err(DeliveryError::Network(format!(
						"Failed to get receipt: {}",
						e
					)));
				},
			};

			let current_block = provider.get_block_number().await.map_err(|e| {
				DeliveryError::Network(format!("Failed to get block number: {}", e))
			})?;

			let tx_block = receipt.block_number.unwrap_or(current_block);
			// The inclusion block counts as the first confirmation.
			let current_confirmations = current_block.saturating_sub(tx_block) + 1;

			if current_confirmations >= confirmations {
				return Ok(convert_receipt(&receipt));
			}

			tracing::debug!(
				"Waiting for {} more confirmations...",
				confirmations.saturating_sub(current_confirmations)
			);

			tokio::time::sleep(self.poll_interval).await;
		}
	}

	async fn get_receipt(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		let provider = self.get_provider(chain_id)?;

		match provider.get_transaction_receipt(hash.0).await {
			Ok(Some(receipt)) => Ok(convert_receipt(&receipt)),
			Ok(None) => Err(DeliveryError::Network(format!(
				"Transaction not found on chain {}",
				chain_id
			))),
			Err(e) => Err(DeliveryError::Network(format!(
				"Failed to get receipt on chain {}: {}",
				chain_id, e
			))),
		}
	}

	async fn transfer(
		&self,
		chain_id: u64,
		to: Address,
		amount: U256,
	) -> Result<TransactionHash, DeliveryError> {
		let tx = TransactionRequest::default().to(to).value(amount);
		self.send(chain_id, tx).await
	}

	async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, DeliveryError> {
		let provider = self.get_provider(chain_id)?;

		provider
			.get_balance(address)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get balance: {}", e)))
	}

	async fn get_stored_text(
		&self,
		chain_id: u64,
		storage: Address,
		owner: Address,
		index: U256,
	) -> Result<String, DeliveryError> {
		let input = ITextStorage::textsCall { owner, index }.abi_encode();
		let output = self.call(chain_id, storage, input).await?;

		let decoded = ITextStorage::textsCall::abi_decode_returns(&output, true)
			.map_err(|e| DeliveryError::Network(format!("Invalid texts response: {}", e)))?;
		Ok(decoded._0)
	}
}

/// Factory function to create an HTTP-based delivery provider from configuration.
///
/// # Parameters
/// - `config`: TOML configuration containing:
///   - `network_ids` (required): Array of network IDs to support
///   - `poll_interval_ms` (optional): receipt polling interval
/// - `networks`: Network configuration containing RPC URLs and contract addresses
/// - `relayer_private_key`: Key of the wallet that pays for gas
pub fn create_http_delivery(
	config: &toml::Value,
	networks: &NetworksConfig,
	relayer_private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema::validate_config(config)
		.map_err(|e| DeliveryError::Network(format!("Invalid configuration: {}", e)))?;

	let network_ids = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|arr| {
			arr.iter()
				.filter_map(|v| v.as_integer().map(|i| i as u64))
				.collect::<Vec<_>>()
		})
		.ok_or_else(|| DeliveryError::Network("network_ids is required".to_string()))?;

	let poll_interval = config
		.get("poll_interval_ms")
		.and_then(|v| v.as_integer())
		.map(|ms| ms as u64)
		.unwrap_or(DEFAULT_POLL_INTERVAL_MS);

	let signer: PrivateKeySigner = relayer_private_key.with_exposed(|key| {
		without_0x_prefix(key.trim())
			.parse()
			.map_err(|_| DeliveryError::Network("Invalid relayer private key format".to_string()))
	})?;

	let delivery = AlloyDelivery::new(
		network_ids,
		networks,
		signer,
		Duration::from_millis(poll_interval),
	)?;

	Ok(Box::new(delivery))
}

/// Registry for the HTTP/Alloy delivery implementation.
pub struct Registry;

impl metatx_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "evm_alloy";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_http_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use metatx_types::NetworkConfig;

	const RELAYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn networks() -> NetworksConfig {
		let mut networks = NetworksConfig::new();
		networks.insert(
			11155111,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				forwarder_address: address!("06e698E439701dd6ed543E3f715cB8f0978d07e7"),
				text_storage_address: address!("F38333e5DA5469FD497e27F504A620D96615D967"),
			},
		);
		networks
	}

	#[test]
	fn test_schema_requires_network_ids() {
		let missing: toml::Value = toml::from_str("poll_interval_ms = 500").unwrap();
		assert!(AlloyDeliverySchema::validate_config(&missing).is_err());

		let empty: toml::Value = toml::from_str("network_ids = []").unwrap();
		assert!(AlloyDeliverySchema::validate_config(&empty).is_err());

		let too_fast: toml::Value =
			toml::from_str("network_ids = [1]\npoll_interval_ms = 5").unwrap();
		assert!(AlloyDeliverySchema::validate_config(&too_fast).is_err());
	}

	#[test]
	fn test_error_response_keeps_revert_data() {
		let payload: alloy_json_rpc::ErrorPayload = serde_json::from_str(
			r#"{"code":3,"message":"execution reverted","data":"0xc9a9d8e1"}"#,
		)
		.unwrap();

		let err = classify_rpc_error("eth_call failed", TransportError::ErrorResp(payload));
		match err {
			DeliveryError::Rejected { message, data } => {
				assert_eq!(message, "execution reverted");
				assert_eq!(data, Some(Bytes::from(vec![0xc9, 0xa9, 0xd8, 0xe1])));
			},
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn test_error_response_without_data() {
		let payload: alloy_json_rpc::ErrorPayload =
			serde_json::from_str(r#"{"code":-32000,"message":"nonce too low"}"#).unwrap();

		let err = classify_rpc_error("send failed", TransportError::ErrorResp(payload));
		assert!(matches!(
			err,
			DeliveryError::Rejected { ref message, data: None } if message == "nonce too low"
		));
		assert_eq!(err.to_string(), "nonce too low");
	}

	#[test]
	fn test_transport_failure_is_network_error() {
		let err = classify_rpc_error(
			"send failed",
			alloy_transport::TransportErrorKind::custom_str("connection refused"),
		);
		assert!(matches!(err, DeliveryError::Network(_)));
	}

	#[test]
	fn test_factory_builds_provider_without_connecting() {
		let config: toml::Value = toml::from_str("network_ids = [11155111]").unwrap();
		let delivery =
			create_http_delivery(&config, &networks(), &SecretString::from(RELAYER_KEY));
		assert!(delivery.is_ok());
	}

	#[test]
	fn test_factory_rejects_unknown_network() {
		let config: toml::Value = toml::from_str("network_ids = [1]").unwrap();
		let result = create_http_delivery(&config, &networks(), &SecretString::from(RELAYER_KEY));
		assert!(matches!(result, Err(DeliveryError::Network(_))));
	}

	#[test]
	fn test_factory_rejects_bad_key() {
		let config: toml::Value = toml::from_str("network_ids = [11155111]").unwrap();
		let result = create_http_delivery(&config, &networks(), &SecretString::from("0xdead"));
		assert!(result.is_err());
	}

	#[test]
	fn test_relayer_address_from_key() {
		let signer: PrivateKeySigner = RELAYER_KEY[2..].parse().unwrap();
		let delivery = AlloyDelivery::new(
			vec![11155111],
			&networks(),
			signer,
			Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
		)
		.unwrap();
		assert_eq!(
			delivery.relayer(),
			address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
		);
	}
}
