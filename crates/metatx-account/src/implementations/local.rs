//! Local private-key account backed by alloy's `PrivateKeySigner`.

use crate::{AccountError, AccountInterface};
use alloy_primitives::hex;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use metatx_types::{
	with_0x_prefix, without_0x_prefix, Address, ConfigSchema, Field, FieldType, ForwardSignature,
	Schema, SecretString, ValidationError, B256,
};

/// Account holding a secp256k1 key in memory.
pub struct LocalWallet {
	signer: PrivateKeySigner,
}

impl LocalWallet {
	/// Creates a wallet from a hex private key (with or without 0x).
	pub fn new(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key.with_exposed(|key| {
			without_0x_prefix(key.trim())
				.parse::<PrivateKeySigner>()
				.map_err(|e| AccountError::InvalidKey(e.to_string()))
		})?;
		Ok(Self { signer })
	}

	/// Creates a wallet with a freshly generated key.
	pub fn random() -> Self {
		let signer = PrivateKeySigner::random();
		tracing::debug!(address = %signer.address(), "Generated ephemeral wallet");
		Self { signer }
	}

	/// Address of the wallet, available without awaiting.
	pub fn address(&self) -> Address {
		self.signer.address()
	}
}

/// Configuration schema for LocalWallet.
pub struct LocalWalletSchema;

impl LocalWalletSchema {
	/// Static validation method for use before instance creation
	pub fn validate_config(config: &toml::Value) -> Result<(), ValidationError> {
		LocalWalletSchema.validate(config)
	}
}

impl ConfigSchema for LocalWalletSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("private_key", FieldType::String).with_validator(|value| {
					let key = value.as_str().unwrap_or_default();
					let digits = without_0x_prefix(key.trim());
					if digits.len() != 64 {
						return Err("Private key must be 64 hex characters".to_string());
					}
					if hex::decode(digits).is_err() {
						return Err("Private key must be valid hex".to_string());
					}
					Ok(())
				}),
			],
			vec![],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl AccountInterface for LocalWallet {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(LocalWalletSchema)
	}

	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_digest(&self, digest: &B256) -> Result<ForwardSignature, AccountError> {
		let signature = self
			.signer
			.sign_hash_sync(digest)
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;
		ForwardSignature::from_slice(&signature.as_bytes())
			.map_err(|e| AccountError::SigningFailed(e.to_string()))
	}

	fn get_private_key(&self) -> SecretString {
		SecretString::new(with_0x_prefix(&hex::encode(self.signer.to_bytes())))
	}
}

/// Factory function to create an account provider from configuration.
///
/// Configuration parameters:
/// - `private_key`: Hex-encoded private key (with or without 0x prefix)
pub fn create_account(config: &toml::Value) -> Result<Box<dyn AccountInterface>, AccountError> {
	LocalWalletSchema::validate_config(config)
		.map_err(|e| AccountError::InvalidKey(format!("Invalid configuration: {}", e)))?;

	let private_key = config
		.get("private_key")
		.and_then(|v| v.as_str())
		.ok_or_else(|| AccountError::InvalidKey("private_key is required".to_string()))?;

	let wallet = LocalWallet::new(&SecretString::from(private_key))?;
	Ok(Box::new(wallet))
}

/// Registry for the local wallet implementation.
pub struct Registry;

impl metatx_types::ImplementationRegistry for Registry {
	const NAME: &'static str = "local";
	type Factory = crate::AccountFactory;

	fn factory() -> Self::Factory {
		create_account
	}
}

impl crate::AccountRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, keccak256};

	const HARDHAT_KEY_1: &str =
		"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	fn config(key: &str) -> toml::Value {
		toml::from_str(&format!("private_key = \"{}\"", key)).unwrap()
	}

	#[tokio::test]
	async fn test_address_from_config() {
		let account = create_account(&config(HARDHAT_KEY_1)).unwrap();
		assert_eq!(
			account.address().await.unwrap(),
			address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
		);
	}

	#[tokio::test]
	async fn test_sign_digest_recovers() {
		let account = create_account(&config(HARDHAT_KEY_1)).unwrap();
		let digest = keccak256(b"forward request");

		let signature = account.sign_digest(&digest).await.unwrap();
		assert!(signature.v == 27 || signature.v == 28);
		assert_eq!(
			signature.recover_address(&digest).unwrap(),
			account.address().await.unwrap()
		);
	}

	#[tokio::test]
	async fn test_private_key_roundtrip() {
		let wallet = LocalWallet::random();
		let restored = LocalWallet::new(&wallet.get_private_key()).unwrap();
		assert_eq!(restored.address(), wallet.address());
	}

	#[test]
	fn test_key_without_prefix_accepted() {
		let wallet = LocalWallet::new(&SecretString::from(&HARDHAT_KEY_1[2..])).unwrap();
		assert_eq!(
			wallet.address(),
			address!("70997970C51812dc3A010C7d01b50e0d17dc79C8")
		);
	}

	#[test]
	fn test_invalid_key_rejected() {
		assert!(matches!(
			create_account(&config("0x1234")),
			Err(AccountError::InvalidKey(_))
		));
		let missing: toml::Value = toml::from_str("other = 1").unwrap();
		assert!(create_account(&missing).is_err());
	}
}
