//! In-process forwarder and text storage.
//!
//! Behaves like a `MinimalForwarder` plus `TextStorage` pair deployed on each
//! configured network: `execute` recomputes the request digest, recovers the
//! signer, enforces and bumps the nonce, runs `storeText` with the original
//! sender as `_msgSender()` and records a `TextStored` log. Every transaction
//! is mined immediately into its own block.

use crate::{DeliveryError, DeliveryInterface};
use alloy_primitives::keccak256;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use metatx_types::contracts::{decode_store_text, text_stored_log};
use metatx_types::utils::eip712::{NAME_MINIMAL_FORWARDER, VERSION_MINIMAL_FORWARDER};
use metatx_types::{
	without_0x_prefix, Address, Bytes, ConfigSchema, DigestEncoding, Field, FieldType,
	ForwardRequest, ForwardSignature, ForwarderDomain, NetworksConfig, Schema, SecretString,
	TransactionHash, TransactionReceipt, ValidationError, U256,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Revert reason of `MinimalForwarder.execute` when `verify` fails.
pub const REVERT_SIGNATURE_MISMATCH: &str = "MinimalForwarder: signature does not match request";
/// Revert reason of OpenZeppelin's ECDSA library for a malformed signature.
pub const REVERT_INVALID_SIGNATURE_LENGTH: &str = "ECDSA: invalid signature length";
/// Revert reason of OpenZeppelin's ECDSA library for an unrecoverable signature.
pub const REVERT_INVALID_SIGNATURE: &str = "ECDSA: invalid signature";

#[derive(Debug, Clone, Copy)]
struct Deployment {
	forwarder: Address,
	text_storage: Address,
}

#[derive(Debug, Default)]
struct ChainState {
	nonces: HashMap<Address, U256>,
	texts: HashMap<Address, Vec<String>>,
	balances: HashMap<Address, U256>,
	receipts: HashMap<TransactionHash, TransactionReceipt>,
	block_number: u64,
	tx_count: u64,
}

impl ChainState {
	fn mine(&mut self, chain_id: u64, success: bool, logs: Vec<metatx_types::EventLog>) -> TransactionHash {
		self.tx_count += 1;
		self.block_number += 1;

		let mut preimage = chain_id.to_be_bytes().to_vec();
		preimage.extend_from_slice(&self.tx_count.to_be_bytes());
		let hash = TransactionHash(keccak256(preimage));

		self.receipts.insert(
			hash,
			TransactionReceipt {
				hash,
				block_number: self.block_number,
				success,
				logs,
			},
		);
		hash
	}
}

/// Simulated forwarder deployment for local runs and tests.
///
/// Native value is not conserved: the relayer wallet has unlimited funds, so
/// `transfer` and the value attached to `execute` are credited without a
/// matching debit. Value forwarded by `execute` lands at `request.to` when the
/// inner call succeeds and stays with the forwarder when it fails.
pub struct SimulatedForwarder {
	deployments: HashMap<u64, Deployment>,
	relayer: Address,
	encoding: DigestEncoding,
	domain_name: String,
	domain_version: String,
	state: RwLock<HashMap<u64, ChainState>>,
}

impl SimulatedForwarder {
	/// Deploys a forwarder and text storage at the addresses each network declares.
	pub fn new(networks: &NetworksConfig, relayer: Address, encoding: DigestEncoding) -> Self {
		let deployments = networks
			.iter()
			.map(|(chain_id, network)| {
				(
					*chain_id,
					Deployment {
						forwarder: network.forwarder_address,
						text_storage: network.text_storage_address,
					},
				)
			})
			.collect();

		Self {
			deployments,
			relayer,
			encoding,
			domain_name: NAME_MINIMAL_FORWARDER.to_string(),
			domain_version: VERSION_MINIMAL_FORWARDER.to_string(),
			state: RwLock::new(HashMap::new()),
		}
	}

	/// Overrides the EIP-712 domain name and version the forwarder verifies against.
	pub fn with_domain(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
		self.domain_name = name.into();
		self.domain_version = version.into();
		self
	}

	/// Address the relayer wallet sends from.
	pub fn relayer(&self) -> Address {
		self.relayer
	}

	fn deployment(&self, chain_id: u64) -> Result<Deployment, DeliveryError> {
		self.deployments.get(&chain_id).copied().ok_or_else(|| {
			DeliveryError::Network(format!("No simulated deployment for chain ID {}", chain_id))
		})
	}

	fn forwarder_deployment(
		&self,
		chain_id: u64,
		forwarder: Address,
	) -> Result<Deployment, DeliveryError> {
		let deployment = self.deployment(chain_id)?;
		if deployment.forwarder != forwarder {
			return Err(DeliveryError::rejected(format!(
				"no forwarder deployed at {}",
				forwarder
			)));
		}
		Ok(deployment)
	}

	/// Recovers the request signer, reverting like OpenZeppelin's `ECDSA.recover`.
	fn recover_signer(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<Address, DeliveryError> {
		if signature.len() != ForwardSignature::LENGTH {
			return Err(DeliveryError::rejected(REVERT_INVALID_SIGNATURE_LENGTH));
		}
		// `ecrecover` only understands v in {27, 28}.
		let signature = ForwardSignature::from_slice(signature)
			.ok()
			.filter(|sig| sig.v >= 27)
			.ok_or_else(|| DeliveryError::rejected(REVERT_INVALID_SIGNATURE))?;
		let digest = request.digest(self.encoding, &self.domain(chain_id, forwarder));
		signature
			.recover_address(&digest)
			.map_err(|_| DeliveryError::rejected(REVERT_INVALID_SIGNATURE))
	}

	fn domain(&self, chain_id: u64, forwarder: Address) -> ForwarderDomain {
		ForwarderDomain::new(
			self.domain_name.clone(),
			self.domain_version.clone(),
			chain_id,
			forwarder,
		)
	}
}

/// Configuration schema for the simulated forwarder.
pub struct SimulatedForwarderSchema;

impl SimulatedForwarderSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		SimulatedForwarderSchema.validate(config)
	}
}

impl ConfigSchema for SimulatedForwarderSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new(
				"network_ids",
				FieldType::Array(Box::new(FieldType::Integer {
					min: Some(1),
					max: None,
				})),
			)],
			vec![
				Field::new("encoding", FieldType::String).with_validator(|value| {
					value
						.as_str()
						.unwrap_or_default()
						.parse::<DigestEncoding>()
						.map(|_| ())
				}),
				Field::new("domain_name", FieldType::String),
				Field::new("domain_version", FieldType::String),
			],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for SimulatedForwarder {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(SimulatedForwarderSchema)
	}

	async fn get_forwarder_nonce(
		&self,
		chain_id: u64,
		forwarder: Address,
		from: Address,
	) -> Result<U256, DeliveryError> {
		self.forwarder_deployment(chain_id, forwarder)?;

		let state = self.state.read().await;
		Ok(state
			.get(&chain_id)
			.and_then(|chain| chain.nonces.get(&from).copied())
			.unwrap_or_default())
	}

	async fn verify_forward_request(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<bool, DeliveryError> {
		self.forwarder_deployment(chain_id, forwarder)?;
		let signer = self.recover_signer(chain_id, forwarder, request, signature)?;

		let state = self.state.read().await;
		let current_nonce = state
			.get(&chain_id)
			.and_then(|chain| chain.nonces.get(&request.from).copied())
			.unwrap_or_default();
		Ok(signer == request.from && current_nonce == request.nonce)
	}

	async fn execute(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<TransactionHash, DeliveryError> {
		let deployment = self.forwarder_deployment(chain_id, forwarder)?;
		let signer = self.recover_signer(chain_id, forwarder, request, signature)?;

		let mut state = self.state.write().await;
		let chain = state.entry(chain_id).or_default();

		let current_nonce = chain.nonces.get(&request.from).copied().unwrap_or_default();
		if signer != request.from || current_nonce != request.nonce {
			tracing::debug!(
				chain_id,
				recovered = %signer,
				expected = %request.from,
				nonce = %request.nonce,
				current_nonce = %current_nonce,
				"Simulated forwarder rejected request"
			);
			return Err(DeliveryError::rejected(REVERT_SIGNATURE_MISMATCH));
		}
		chain
			.nonces
			.insert(request.from, current_nonce + U256::from(1u64));

		// A failing inner call does not revert `execute`; only its effects are missing.
		let mut logs = Vec::new();
		let inner_succeeded = if request.to == deployment.text_storage {
			match decode_store_text(&request.data) {
				// `storeText` is not payable.
				Some(text) if request.value.is_zero() => {
					chain
						.texts
						.entry(request.from)
						.or_default()
						.push(text.clone());
					logs.push(text_stored_log(deployment.text_storage, request.from, &text));
					true
				},
				_ => false,
			}
		} else {
			true
		};

		if !request.value.is_zero() {
			let recipient = if inner_succeeded { request.to } else { forwarder };
			*chain.balances.entry(recipient).or_default() += request.value;
		}

		let hash = chain.mine(chain_id, true, logs);
		tracing::info!(
			tx_hash = %hash,
			chain_id,
			from = %request.from,
			inner_succeeded,
			"Simulated execute mined"
		);
		Ok(hash)
	}

	async fn wait_for_confirmation(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		let mut state = self.state.write().await;
		let chain = state.entry(chain_id).or_default();

		let receipt = chain.receipts.get(hash).cloned().ok_or_else(|| {
			DeliveryError::Network(format!("Transaction not found on chain {}", chain_id))
		})?;

		// Mine empty blocks until the requested depth is reached.
		let target = receipt
			.block_number
			.saturating_add(confirmations.saturating_sub(1));
		chain.block_number = chain.block_number.max(target);

		Ok(receipt)
	}

	async fn get_receipt(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		let state = self.state.read().await;
		state
			.get(&chain_id)
			.and_then(|chain| chain.receipts.get(hash).cloned())
			.ok_or_else(|| {
				DeliveryError::Network(format!("Transaction not found on chain {}", chain_id))
			})
	}

	async fn transfer(
		&self,
		chain_id: u64,
		to: Address,
		amount: U256,
	) -> Result<TransactionHash, DeliveryError> {
		self.deployment(chain_id)?;

		let mut state = self.state.write().await;
		let chain = state.entry(chain_id).or_default();
		*chain.balances.entry(to).or_default() += amount;

		let hash = chain.mine(chain_id, true, Vec::new());
		tracing::info!(tx_hash = %hash, chain_id, to = %to, amount = %amount, "Simulated transfer mined");
		Ok(hash)
	}

	async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, DeliveryError> {
		self.deployment(chain_id)?;

		let state = self.state.read().await;
		Ok(state
			.get(&chain_id)
			.and_then(|chain| chain.balances.get(&address).copied())
			.unwrap_or_default())
	}

	async fn get_stored_text(
		&self,
		chain_id: u64,
		storage: Address,
		owner: Address,
		index: U256,
	) -> Result<String, DeliveryError> {
		let deployment = self.deployment(chain_id)?;
		if deployment.text_storage != storage {
			return Err(DeliveryError::rejected(format!(
				"no text storage deployed at {}",
				storage
			)));
		}

		let state = self.state.read().await;
		let texts = state
			.get(&chain_id)
			.and_then(|chain| chain.texts.get(&owner));

		usize::try_from(index)
			.ok()
			.and_then(|i| texts.and_then(|t| t.get(i)).cloned())
			.ok_or_else(|| DeliveryError::rejected("execution reverted: array index out of bounds"))
	}
}

/// Factory function to create a simulated forwarder from configuration.
///
/// Configuration parameters:
/// - `network_ids` (required): networks to simulate, each must exist in `networks`
/// - `encoding` (optional): digest the forwarder verifies, `"eip712"` (default) or `"packed"`
/// - `domain_name` / `domain_version` (optional): EIP-712 domain overrides
pub fn create_simulated_delivery(
	config: &toml::Value,
	networks: &NetworksConfig,
	relayer_private_key: &SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	SimulatedForwarderSchema::validate_config(config)
		.map_err(|e| DeliveryError::Network(format!("Invalid configuration: {}", e)))?;

	let network_ids: Vec<u64> = config
		.get("network_ids")
		.and_then(|v| v.as_array())
		.map(|arr| {
			arr.iter()
				.filter_map(|v| v.as_integer().map(|i| i as u64))
				.collect()
		})
		.unwrap_or_default();

	let mut selected = NetworksConfig::new();
	for network_id in network_ids {
		let network = networks.get(&network_id).ok_or_else(|| {
			DeliveryError::Network(format!("Network {} not found in configuration", network_id))
		})?;
		selected.insert(network_id, network.clone());
	}

	let encoding = config
		.get("encoding")
		.and_then(|v| v.as_str())
		.map(|s| s.parse::<DigestEncoding>())
		.transpose()
		.map_err(DeliveryError::Network)?
		.unwrap_or_default();

	let relayer: PrivateKeySigner = relayer_private_key.with_exposed(|key| {
		without_0x_prefix(key.trim())
			.parse()
			.map_err(|_| DeliveryError::Network("Invalid relayer private key format".to_string()))
	})?;

	let mut forwarder = SimulatedForwarder::new(&selected, relayer.address(), encoding);
	if let Some(name) = config.get("domain_name").and_then(|v| v.as_str()) {
		forwarder.domain_name = name.to_string();
	}
	if let Some(version) = config.get("domain_version").and_then(|v| v.as_str()) {
		forwarder.domain_version = version.to_string();
	}

	Ok(Box::new(forwarder))
}

/// Registry for the simulated delivery implementation.
pub struct Registry;

impl metatx_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "simulated";
	type Factory = crate::DeliveryFactory;

	fn factory() -> Self::Factory {
		create_simulated_delivery
	}
}

impl crate::DeliveryRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_signer::SignerSync;
	use metatx_types::contracts::{decode_text_stored, encode_store_text};
	use metatx_types::NetworkConfig;

	const CHAIN_ID: u64 = 11155111;
	const FORWARDER: Address = address!("06e698E439701dd6ed543E3f715cB8f0978d07e7");
	const STORAGE: Address = address!("F38333e5DA5469FD497e27F504A620D96615D967");

	fn networks() -> NetworksConfig {
		let mut networks = NetworksConfig::new();
		networks.insert(
			CHAIN_ID,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				forwarder_address: FORWARDER,
				text_storage_address: STORAGE,
			},
		);
		networks
	}

	fn sign(
		signer: &PrivateKeySigner,
		request: &ForwardRequest,
		encoding: DigestEncoding,
	) -> Bytes {
		let domain = ForwarderDomain::minimal_forwarder(CHAIN_ID, FORWARDER);
		let digest = request.digest(encoding, &domain);
		let signature = signer.sign_hash_sync(&digest).unwrap();
		Bytes::from(signature.as_bytes().to_vec())
	}

	fn store_request(from: Address, nonce: u64, text: &str) -> ForwardRequest {
		ForwardRequest::new(
			from,
			STORAGE,
			U256::ZERO,
			U256::from(1_000_000u64),
			U256::from(nonce),
			encode_store_text(text),
		)
	}

	#[tokio::test]
	async fn test_execute_stores_text_and_bumps_nonce() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let request = store_request(user.address(), 0, "metaTx!");
		let signature = sign(&user, &request, DigestEncoding::Eip712);

		let hash = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap();
		let receipt = forwarder
			.wait_for_confirmation(CHAIN_ID, &hash, 1)
			.await
			.unwrap();

		assert!(receipt.success);
		let event = decode_text_stored(&receipt.logs[0]).unwrap();
		assert_eq!(event.user, user.address());
		assert_eq!(event.text, "metaTx!");
		assert_eq!(
			forwarder
				.get_forwarder_nonce(CHAIN_ID, FORWARDER, user.address())
				.await
				.unwrap(),
			U256::from(1u64)
		);
		assert_eq!(
			forwarder
				.get_stored_text(CHAIN_ID, STORAGE, user.address(), U256::ZERO)
				.await
				.unwrap(),
			"metaTx!"
		);
	}

	#[tokio::test]
	async fn test_replayed_nonce_rejected() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let request = store_request(user.address(), 0, "once");
		let signature = sign(&user, &request, DigestEncoding::Eip712);

		forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap();
		let err = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap_err();

		assert!(matches!(err, DeliveryError::Rejected { ref message, .. } if message == REVERT_SIGNATURE_MISMATCH));
	}

	#[tokio::test]
	async fn test_encoding_mismatch_rejected() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let request = store_request(user.address(), 0, "hello");
		let signature = sign(&user, &request, DigestEncoding::Packed);

		let err = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Rejected { ref message, .. } if message == REVERT_SIGNATURE_MISMATCH));
	}

	#[tokio::test]
	async fn test_packed_forwarder_accepts_packed_signature() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Packed);
		let user = PrivateKeySigner::random();
		let request = store_request(user.address(), 0, "hello");
		let signature = sign(&user, &request, DigestEncoding::Packed);

		assert!(forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.is_ok());
	}

	#[tokio::test]
	async fn test_malformed_signature_rejected() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let request = store_request(Address::ZERO, 0, "hello");

		let err = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &Bytes::from(vec![0u8; 64]))
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Rejected { ref message, .. } if message == REVERT_INVALID_SIGNATURE_LENGTH));
	}

	#[tokio::test]
	async fn test_y_parity_signature_rejected() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let request = store_request(user.address(), 0, "hello");
		let mut signature = sign(&user, &request, DigestEncoding::Eip712).to_vec();
		signature[64] -= 27;

		let err = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &Bytes::from(signature))
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Rejected { ref message, .. } if message == REVERT_INVALID_SIGNATURE));
	}

	#[tokio::test]
	async fn test_unknown_calldata_executes_without_log() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let mut request = store_request(user.address(), 0, "");
		request.data = Bytes::new();
		let signature = sign(&user, &request, DigestEncoding::Eip712);

		let hash = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap();
		let receipt = forwarder.get_receipt(CHAIN_ID, &hash).await.unwrap();
		assert!(receipt.success);
		assert!(receipt.logs.is_empty());
	}

	#[tokio::test]
	async fn test_read_out_of_range_rejected() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let result = forwarder
			.get_stored_text(CHAIN_ID, STORAGE, Address::ZERO, U256::from(3u64))
			.await;
		assert!(matches!(result, Err(DeliveryError::Rejected { .. })));
	}

	#[tokio::test]
	async fn test_verify_matches_execute_acceptance() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let request = store_request(user.address(), 0, "hello");
		let signature = sign(&user, &request, DigestEncoding::Eip712);
		let wrong_encoding = sign(&user, &request, DigestEncoding::Packed);

		assert!(forwarder
			.verify_forward_request(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap());
		assert!(!forwarder
			.verify_forward_request(CHAIN_ID, FORWARDER, &request, &wrong_encoding)
			.await
			.unwrap());

		forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap();
		// Nonce consumed.
		assert!(!forwarder
			.verify_forward_request(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap());

		let err = forwarder
			.verify_forward_request(CHAIN_ID, FORWARDER, &request, &Bytes::from(vec![0u8; 64]))
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Rejected { ref message, .. } if message == REVERT_INVALID_SIGNATURE_LENGTH));
	}

	#[tokio::test]
	async fn test_execute_forwards_value_to_recipient() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let recipient = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
		let request = ForwardRequest::new(
			user.address(),
			recipient,
			U256::from(1_000u64),
			U256::from(100_000u64),
			U256::ZERO,
			Bytes::new(),
		);
		let signature = sign(&user, &request, DigestEncoding::Eip712);

		forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap();

		assert_eq!(
			forwarder.get_balance(CHAIN_ID, recipient).await.unwrap(),
			U256::from(1_000u64)
		);
		assert_eq!(
			forwarder.get_balance(CHAIN_ID, FORWARDER).await.unwrap(),
			U256::ZERO
		);
	}

	#[tokio::test]
	async fn test_value_to_store_text_stays_with_forwarder() {
		let forwarder = SimulatedForwarder::new(&networks(), Address::ZERO, DigestEncoding::Eip712);
		let user = PrivateKeySigner::random();
		let mut request = store_request(user.address(), 0, "paid");
		request.value = U256::from(7u64);
		let signature = sign(&user, &request, DigestEncoding::Eip712);

		let hash = forwarder
			.execute(CHAIN_ID, FORWARDER, &request, &signature)
			.await
			.unwrap();
		let receipt = forwarder.get_receipt(CHAIN_ID, &hash).await.unwrap();

		// Outer call succeeds, non-payable inner call does not.
		assert!(receipt.success);
		assert!(receipt.logs.is_empty());
		assert_eq!(
			forwarder.get_balance(CHAIN_ID, FORWARDER).await.unwrap(),
			U256::from(7u64)
		);
		assert_eq!(
			forwarder.get_balance(CHAIN_ID, STORAGE).await.unwrap(),
			U256::ZERO
		);
		assert!(forwarder
			.get_stored_text(CHAIN_ID, STORAGE, user.address(), U256::ZERO)
			.await
			.is_err());
		assert_eq!(
			forwarder
				.get_forwarder_nonce(CHAIN_ID, FORWARDER, user.address())
				.await
				.unwrap(),
			U256::from(1u64)
		);
	}

	#[test]
	fn test_factory_reads_table() {
		let config: toml::Value =
			toml::from_str("network_ids = [11155111]\nencoding = \"packed\"").unwrap();
		let key = SecretString::from("0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");
		assert!(create_simulated_delivery(&config, &networks(), &key).is_ok());

		let unknown: toml::Value = toml::from_str("network_ids = [1]").unwrap();
		assert!(create_simulated_delivery(&unknown, &networks(), &key).is_err());

		let bad_encoding: toml::Value =
			toml::from_str("network_ids = [11155111]\nencoding = \"rlp\"").unwrap();
		assert!(create_simulated_delivery(&bad_encoding, &networks(), &key).is_err());
	}
}
