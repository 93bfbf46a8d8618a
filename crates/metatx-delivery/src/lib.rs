//! Transaction delivery for the relay toolkit.
//!
//! This crate talks to the chain on behalf of the relayer: it reads forwarder
//! nonces, submits `execute` calls carrying a user's signed forward request,
//! funds wallets, waits for receipts and reads back stored text. Each
//! implementation serves one or more chains and owns the relayer wallet that
//! pays for gas.

use async_trait::async_trait;
use metatx_types::{
	Address, Bytes, ConfigSchema, ForwardRequest, ImplementationRegistry, NetworksConfig,
	SecretString, TransactionHash, TransactionReceipt, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod simulated;
}

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The node or contract refused the call. Holds the remote message verbatim
	/// and, when the node returned one, the raw revert data.
	#[error("{message}{}", .data.as_ref().map(|data| format!(" (revert data: {})", data)).unwrap_or_default())]
	Rejected {
		message: String,
		data: Option<Bytes>,
	},
	/// Error that occurs when no suitable provider is available for the operation.
	#[error("No provider available")]
	NoProviderAvailable,
}

impl DeliveryError {
	/// A rejection carrying only a message.
	pub fn rejected(message: impl Into<String>) -> Self {
		Self::Rejected {
			message: message.into(),
			data: None,
		}
	}
}

/// Trait defining the interface for transaction delivery providers.
///
/// Every method takes the chain id it targets; an implementation configured
/// for several networks routes internally.
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Returns the configuration schema for this delivery implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Reads `getNonce(from)` from the forwarder.
	async fn get_forwarder_nonce(
		&self,
		chain_id: u64,
		forwarder: Address,
		from: Address,
	) -> Result<U256, DeliveryError>;

	/// Sends `execute(request, signature)` to the forwarder from the relayer wallet.
	///
	/// A refusal by the node before inclusion (failed estimation, revert during
	/// simulation) is reported as [`DeliveryError::Rejected`] with the remote
	/// message unmodified.
	async fn execute(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<TransactionHash, DeliveryError>;

	/// Calls the forwarder's `verify(request, signature)` view.
	///
	/// `Ok(false)` means the forwarder would revert `execute` with a signature
	/// mismatch. A signature that cannot be recovered at all is a rejection.
	async fn verify_forward_request(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<bool, DeliveryError>;

	/// Waits for a transaction to be included and buried under `confirmations` blocks.
	async fn wait_for_confirmation(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Retrieves the receipt for a transaction if available.
	async fn get_receipt(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Sends native value from the relayer wallet.
	async fn transfer(
		&self,
		chain_id: u64,
		to: Address,
		amount: U256,
	) -> Result<TransactionHash, DeliveryError>;

	/// Native balance of `address` in wei.
	async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, DeliveryError>;

	/// Reads `texts(owner, index)` from the text storage contract.
	async fn get_stored_text(
		&self,
		chain_id: u64,
		storage: Address,
		owner: Address,
		index: U256,
	) -> Result<String, DeliveryError>;
}

/// Type alias for delivery factory functions.
///
/// Receives the implementation's own TOML table, the network map and the
/// relayer's private key.
pub type DeliveryFactory = fn(
	&toml::Value,
	&NetworksConfig,
	&SecretString,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError>;

/// Registry trait for delivery implementations.
pub trait DeliveryRegistry: ImplementationRegistry<Factory = DeliveryFactory> {}

/// Get all registered delivery implementations.
pub fn get_all_implementations() -> Vec<(&'static str, DeliveryFactory)> {
	use implementations::{evm::alloy, simulated};

	vec![
		(alloy::Registry::NAME, alloy::Registry::factory()),
		(simulated::Registry::NAME, simulated::Registry::factory()),
	]
}

/// Service that routes delivery calls to the provider configured for a chain.
pub struct DeliveryService {
	/// Map of chain IDs to their corresponding delivery providers.
	providers: HashMap<u64, Arc<dyn DeliveryInterface>>,
	/// Default number of confirmations required for transactions.
	min_confirmations: u64,
}

impl DeliveryService {
	/// Creates a new DeliveryService with the specified providers and configuration.
	pub fn new(providers: HashMap<u64, Arc<dyn DeliveryInterface>>, min_confirmations: u64) -> Self {
		Self {
			providers,
			min_confirmations,
		}
	}

	/// Registers one implementation for every chain id in `chain_ids`.
	pub fn with_provider(
		chain_ids: &[u64],
		provider: Arc<dyn DeliveryInterface>,
		min_confirmations: u64,
	) -> Self {
		let providers = chain_ids
			.iter()
			.map(|id| (*id, provider.clone()))
			.collect();
		Self::new(providers, min_confirmations)
	}

	fn provider(&self, chain_id: u64) -> Result<&Arc<dyn DeliveryInterface>, DeliveryError> {
		self.providers
			.get(&chain_id)
			.ok_or(DeliveryError::NoProviderAvailable)
	}

	/// Configured confirmation depth.
	pub fn min_confirmations(&self) -> u64 {
		self.min_confirmations
	}

	/// Reads the forwarder nonce for `from`.
	pub async fn get_forwarder_nonce(
		&self,
		chain_id: u64,
		forwarder: Address,
		from: Address,
	) -> Result<U256, DeliveryError> {
		self.provider(chain_id)?
			.get_forwarder_nonce(chain_id, forwarder, from)
			.await
	}

	/// Asks the forwarder whether it would accept a signed forward request.
	pub async fn verify_forward_request(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<bool, DeliveryError> {
		self.provider(chain_id)?
			.verify_forward_request(chain_id, forwarder, request, signature)
			.await
	}

	/// Submits a signed forward request through the forwarder.
	pub async fn execute(
		&self,
		chain_id: u64,
		forwarder: Address,
		request: &ForwardRequest,
		signature: &Bytes,
	) -> Result<TransactionHash, DeliveryError> {
		self.provider(chain_id)?
			.execute(chain_id, forwarder, request, signature)
			.await
	}

	/// Waits for a transaction with the configured number of confirmations.
	pub async fn confirm_with_default(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.confirm(chain_id, hash, self.min_confirmations).await
	}

	/// Waits for a transaction with an explicit number of confirmations.
	pub async fn confirm(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
		confirmations: u64,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.provider(chain_id)?
			.wait_for_confirmation(chain_id, hash, confirmations)
			.await
	}

	/// Returns the current receipt without waiting.
	pub async fn get_receipt(
		&self,
		chain_id: u64,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		self.provider(chain_id)?.get_receipt(chain_id, hash).await
	}

	/// Sends native value from the relayer wallet.
	pub async fn transfer(
		&self,
		chain_id: u64,
		to: Address,
		amount: U256,
	) -> Result<TransactionHash, DeliveryError> {
		self.provider(chain_id)?.transfer(chain_id, to, amount).await
	}

	/// Gets the native balance for an address on a specific chain.
	pub async fn get_balance(&self, chain_id: u64, address: Address) -> Result<U256, DeliveryError> {
		self.provider(chain_id)?.get_balance(chain_id, address).await
	}

	/// Reads a stored text entry.
	pub async fn get_stored_text(
		&self,
		chain_id: u64,
		storage: Address,
		owner: Address,
		index: U256,
	) -> Result<String, DeliveryError> {
		self.provider(chain_id)?
			.get_stored_text(chain_id, storage, owner, index)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::simulated::SimulatedForwarder;
	use alloy_primitives::address;
	use metatx_types::{DigestEncoding, NetworkConfig};

	fn service() -> DeliveryService {
		let mut networks = NetworksConfig::new();
		networks.insert(
			31337,
			NetworkConfig {
				rpc_url: "http://localhost:8545".to_string(),
				forwarder_address: address!("06e698E439701dd6ed543E3f715cB8f0978d07e7"),
				text_storage_address: address!("F38333e5DA5469FD497e27F504A620D96615D967"),
			},
		);
		let simulated = SimulatedForwarder::new(&networks, Address::ZERO, DigestEncoding::Eip712);
		DeliveryService::with_provider(&[31337], Arc::new(simulated), 1)
	}

	#[tokio::test]
	async fn test_unknown_chain_has_no_provider() {
		let service = service();
		let result = service.get_balance(1, Address::ZERO).await;
		assert!(matches!(result, Err(DeliveryError::NoProviderAvailable)));
	}

	#[tokio::test]
	async fn test_routes_to_configured_chain() {
		let service = service();
		let recipient = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

		let hash = service
			.transfer(31337, recipient, U256::from(10u64))
			.await
			.unwrap();
		let receipt = service.confirm_with_default(31337, &hash).await.unwrap();

		assert!(receipt.success);
		assert_eq!(
			service.get_balance(31337, recipient).await.unwrap(),
			U256::from(10u64)
		);
	}

	#[test]
	fn test_rejection_message_is_verbatim() {
		let err = DeliveryError::rejected("MinimalForwarder: signature does not match request");
		assert_eq!(
			err.to_string(),
			"MinimalForwarder: signature does not match request"
		);
	}

	#[test]
	fn test_rejection_display_includes_revert_data() {
		let err = DeliveryError::Rejected {
			message: "execution reverted".to_string(),
			data: Some(Bytes::from(vec![0xc9, 0xa9, 0xd8, 0xe1])),
		};
		assert_eq!(
			err.to_string(),
			"execution reverted (revert data: 0xc9a9d8e1)"
		);
	}
}
