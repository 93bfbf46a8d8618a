//! Account management for the relay toolkit.
//!
//! An account is anything that can produce a recoverable secp256k1 signature
//! over a 32-byte digest. Forward requests are signed by the original sender
//! through this interface; the relayer that pays for gas is configured the
//! same way and handed to the delivery layer.

use async_trait::async_trait;
use metatx_types::{Address, ConfigSchema, ForwardSignature, ImplementationRegistry, SecretString, B256};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// The underlying signer rejected the digest.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// The configured key is missing or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Trait defining the interface for account implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Returns the configuration schema for this account implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte digest as-is.
	///
	/// No EIP-191 prefix or extra hashing is applied: the digest must already
	/// be exactly what the verifier recomputes. The returned `v` is 27 or 28.
	async fn sign_digest(&self, digest: &B256) -> Result<ForwardSignature, AccountError>;

	/// Returns the private key as a SecretString with 0x prefix.
	///
	/// Delivery implementations use it to build their transaction wallet.
	fn get_private_key(&self) -> SecretString;
}

/// Type alias for account factory functions.
pub type AccountFactory = fn(&toml::Value) -> Result<Box<dyn AccountInterface>, AccountError>;

/// Registry trait for account implementations.
pub trait AccountRegistry: ImplementationRegistry<Factory = AccountFactory> {}

/// Get all registered account implementations.
pub fn get_all_implementations() -> Vec<(&'static str, AccountFactory)> {
	use implementations::local;

	vec![(local::Registry::NAME, local::Registry::factory())]
}

/// Service that manages account operations.
pub struct AccountService {
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Retrieves the address associated with the managed account.
	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs a digest with the managed account.
	pub async fn sign_digest(&self, digest: &B256) -> Result<ForwardSignature, AccountError> {
		self.implementation.sign_digest(digest).await
	}

	/// Returns the private key as a SecretString.
	pub fn get_private_key(&self) -> SecretString {
		self.implementation.get_private_key()
	}

	/// Borrows the underlying implementation.
	pub fn account(&self) -> &dyn AccountInterface {
		self.implementation.as_ref()
	}
}
