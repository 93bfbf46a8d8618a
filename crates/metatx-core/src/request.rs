//! Forward request construction, hashing and signing.
//!
//! [`MetaTransactionRequestBuilder`] is bound to one forwarder domain and one
//! digest encoding. Everything here is pure computation apart from
//! [`sign`](MetaTransactionRequestBuilder::sign), which awaits the account.

use crate::ForwarderError;
use metatx_account::AccountInterface;
use metatx_types::{
	Address, Bytes, DigestEncoding, ForwardRequest, ForwardSignature, ForwarderDomain,
	VConvention, B256, U256,
};

/// A request paired with the digest the forwarder will recompute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestedRequest {
	request: ForwardRequest,
	encoding: DigestEncoding,
	digest: B256,
}

impl DigestedRequest {
	pub fn request(&self) -> &ForwardRequest {
		&self.request
	}

	pub fn encoding(&self) -> DigestEncoding {
		self.encoding
	}

	pub fn digest(&self) -> B256 {
		self.digest
	}
}

/// A request with its digest and the signer's signature over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
	request: ForwardRequest,
	encoding: DigestEncoding,
	digest: B256,
	signature: ForwardSignature,
}

impl SignedRequest {
	pub fn request(&self) -> &ForwardRequest {
		&self.request
	}

	pub fn encoding(&self) -> DigestEncoding {
		self.encoding
	}

	pub fn digest(&self) -> B256 {
		self.digest
	}

	pub fn signature(&self) -> &ForwardSignature {
		&self.signature
	}

	/// The 65-byte `r || s || v` passed to `execute`.
	pub fn signature_bytes(&self) -> Bytes {
		self.signature.to_bytes()
	}
}

/// Builds, hashes and signs forward requests for a single forwarder.
#[derive(Debug, Clone)]
pub struct MetaTransactionRequestBuilder {
	domain: ForwarderDomain,
	encoding: DigestEncoding,
	v_convention: VConvention,
	self_verify: bool,
}

impl MetaTransactionRequestBuilder {
	/// EIP-712 digests, v in {27, 28}, self-verification on.
	pub fn new(domain: ForwarderDomain) -> Self {
		Self {
			domain,
			encoding: DigestEncoding::default(),
			v_convention: VConvention::default(),
			self_verify: true,
		}
	}

	pub fn with_encoding(mut self, encoding: DigestEncoding) -> Self {
		self.encoding = encoding;
		self
	}

	pub fn with_v_convention(mut self, v_convention: VConvention) -> Self {
		self.v_convention = v_convention;
		self
	}

	/// Whether [`sign_request`](Self::sign_request) recovers the signer before returning.
	pub fn with_self_verify(mut self, self_verify: bool) -> Self {
		self.self_verify = self_verify;
		self
	}

	pub fn domain(&self) -> &ForwarderDomain {
		&self.domain
	}

	pub fn encoding(&self) -> DigestEncoding {
		self.encoding
	}

	/// Assembles a request. Every field is taken verbatim.
	pub fn build_request(
		&self,
		from: Address,
		to: Address,
		value: U256,
		gas: U256,
		data: Bytes,
		current_nonce: U256,
	) -> ForwardRequest {
		ForwardRequest::new(from, to, value, gas, current_nonce, data)
	}

	/// Digest under the configured encoding.
	pub fn compute_digest(&self, request: &ForwardRequest) -> B256 {
		self.compute_digest_with(request, self.encoding)
	}

	/// Digest under an explicit encoding.
	pub fn compute_digest_with(&self, request: &ForwardRequest, encoding: DigestEncoding) -> B256 {
		let digest = request.digest(encoding, &self.domain);
		tracing::debug!(
			from = %request.from,
			nonce = %request.nonce,
			%encoding,
			%digest,
			"Computed forward request digest"
		);
		digest
	}

	/// Computes the digest and keeps it with the request.
	pub fn digest(&self, request: ForwardRequest) -> DigestedRequest {
		let digest = self.compute_digest(&request);
		DigestedRequest {
			request,
			encoding: self.encoding,
			digest,
		}
	}

	/// Signs a raw digest with `account`. No EIP-191 prefix is applied.
	pub async fn sign(
		&self,
		digest: &B256,
		account: &dyn AccountInterface,
	) -> Result<ForwardSignature, ForwarderError> {
		let signature = account.sign_digest(digest).await?;
		Ok(signature.normalized(self.v_convention)?)
	}

	/// Recovers the address that produced `signature` over `digest`.
	///
	/// `signature` is the 65-byte `r || s || v` form; v may be 0/1 or 27/28.
	pub fn recover(&self, digest: &B256, signature: &[u8]) -> Result<Address, ForwarderError> {
		let signature = ForwardSignature::from_slice(signature)?;
		Ok(signature.recover_address(digest)?)
	}

	/// Checks that the signature recovers to `request.from`.
	pub fn self_verify(&self, signed: &SignedRequest) -> Result<(), ForwarderError> {
		let recovered = signed.signature.recover_address(&signed.digest)?;
		if recovered != signed.request.from {
			return Err(ForwarderError::VerificationMismatch {
				expected: signed.request.from,
				recovered,
			});
		}
		Ok(())
	}

	/// Signs a digested request.
	pub async fn sign_digested(
		&self,
		digested: DigestedRequest,
		account: &dyn AccountInterface,
	) -> Result<SignedRequest, ForwarderError> {
		let signature = self.sign(&digested.digest, account).await?;
		Ok(SignedRequest {
			request: digested.request,
			encoding: digested.encoding,
			digest: digested.digest,
			signature,
		})
	}

	/// Digest, sign and, when enabled, self-verify in one step.
	pub async fn sign_request(
		&self,
		request: ForwardRequest,
		account: &dyn AccountInterface,
	) -> Result<SignedRequest, ForwarderError> {
		let signed = self.sign_digested(self.digest(request), account).await?;
		if self.self_verify {
			self.self_verify(&signed)?;
		}
		Ok(signed)
	}

	/// Whether [`sign_request`](Self::sign_request) self-verifies.
	pub fn verifies_locally(&self) -> bool {
		self.self_verify
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, keccak256};
	use alloy_sol_types::{eip712_domain, SolStruct};
	use metatx_account::implementations::local::LocalWallet;
	use metatx_types::contracts::{self, encode_store_text};
	use metatx_types::SecretString;

	const USER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
	const USER: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
	const OTHER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const FORWARDER: Address = address!("06e698E439701dd6ed543E3f715cB8f0978d07e7");
	const STORAGE: Address = address!("F38333e5DA5469FD497e27F504A620D96615D967");
	const SEPOLIA: u64 = 11155111;

	fn builder() -> MetaTransactionRequestBuilder {
		MetaTransactionRequestBuilder::new(ForwarderDomain::minimal_forwarder(SEPOLIA, FORWARDER))
	}

	fn wallet(key: &str) -> LocalWallet {
		LocalWallet::new(&SecretString::from(key)).unwrap()
	}

	fn hello_request(builder: &MetaTransactionRequestBuilder, nonce: u64) -> ForwardRequest {
		builder.build_request(
			USER,
			STORAGE,
			U256::ZERO,
			U256::from(1_000_000u64),
			encode_store_text("hello"),
			U256::from(nonce),
		)
	}

	#[test]
	fn test_build_request_copies_fields() {
		let builder = builder();
		let data = Bytes::from(vec![0xde, 0xad]);
		let request = builder.build_request(
			USER,
			STORAGE,
			U256::from(7u64),
			U256::from(21_000u64),
			data.clone(),
			U256::from(3u64),
		);

		assert_eq!(request.from, USER);
		assert_eq!(request.to, STORAGE);
		assert_eq!(request.value, U256::from(7u64));
		assert_eq!(request.gas, U256::from(21_000u64));
		assert_eq!(request.nonce, U256::from(3u64));
		assert_eq!(request.data, data);
	}

	#[test]
	fn test_digest_is_deterministic() {
		let builder = builder();
		let request = hello_request(&builder, 0);

		for encoding in [DigestEncoding::Eip712, DigestEncoding::Packed] {
			assert_eq!(
				builder.compute_digest_with(&request, encoding),
				builder.compute_digest_with(&request.clone(), encoding)
			);
		}
	}

	#[test]
	fn test_encodings_diverge() {
		let builder = builder();
		let request = hello_request(&builder, 0);

		assert_ne!(
			builder.compute_digest_with(&request, DigestEncoding::Packed),
			builder.compute_digest_with(&request, DigestEncoding::Eip712)
		);
	}

	#[test]
	fn test_nonce_changes_digest() {
		let builder = builder();
		let first = hello_request(&builder, 0);
		let second = hello_request(&builder, 1);

		for encoding in [DigestEncoding::Eip712, DigestEncoding::Packed] {
			assert_ne!(
				builder.compute_digest_with(&first, encoding),
				builder.compute_digest_with(&second, encoding)
			);
		}
	}

	#[test]
	fn test_domain_changes_eip712_digest_only() {
		let request = hello_request(&builder(), 0);
		let mainnet =
			MetaTransactionRequestBuilder::new(ForwarderDomain::minimal_forwarder(1, FORWARDER));

		assert_ne!(
			builder().compute_digest_with(&request, DigestEncoding::Eip712),
			mainnet.compute_digest_with(&request, DigestEncoding::Eip712)
		);
		assert_eq!(
			builder().compute_digest_with(&request, DigestEncoding::Packed),
			mainnet.compute_digest_with(&request, DigestEncoding::Packed)
		);
	}

	#[test]
	fn test_eip712_digest_matches_typed_data_hash() {
		let builder = builder();
		let request = hello_request(&builder, 4);
		let domain = eip712_domain! {
			name: "MinimalForwarder",
			version: "0.0.1",
			chain_id: SEPOLIA,
			verifying_contract: FORWARDER,
		};

		assert_eq!(
			builder.compute_digest(&request),
			contracts::ForwardRequest::from(&request).eip712_signing_hash(&domain)
		);
	}

	#[test]
	fn test_empty_data_and_empty_string_digests_distinct() {
		let builder = builder();
		let empty = builder.build_request(
			USER,
			STORAGE,
			U256::ZERO,
			U256::from(1_000_000u64),
			Bytes::new(),
			U256::ZERO,
		);
		let empty_text = builder.build_request(
			USER,
			STORAGE,
			U256::ZERO,
			U256::from(1_000_000u64),
			encode_store_text(""),
			U256::ZERO,
		);

		assert!(!encode_store_text("").is_empty());
		for encoding in [DigestEncoding::Eip712, DigestEncoding::Packed] {
			assert_ne!(
				builder.compute_digest_with(&empty, encoding),
				builder.compute_digest_with(&empty_text, encoding)
			);
		}
	}

	#[tokio::test]
	async fn test_sign_recover_roundtrip() {
		let builder = builder();
		let user = wallet(USER_KEY);
		let digest = keccak256(b"arbitrary digest");

		let signature = builder.sign(&digest, &user).await.unwrap();
		let recovered = builder.recover(&digest, &signature.as_bytes()).unwrap();
		assert_eq!(recovered, USER);
	}

	#[tokio::test]
	async fn test_hello_scenario_recovers_user() {
		for encoding in [DigestEncoding::Eip712, DigestEncoding::Packed] {
			let builder = builder().with_encoding(encoding);
			let request = hello_request(&builder, 0);

			let signed = builder
				.sign_request(request, &wallet(USER_KEY))
				.await
				.unwrap();

			assert_eq!(signed.encoding(), encoding);
			assert_eq!(
				builder
					.recover(&signed.digest(), &signed.signature_bytes())
					.unwrap(),
				USER
			);
		}
	}

	#[tokio::test]
	async fn test_v_convention_applied() {
		let digest = keccak256(b"v convention");
		let user = wallet(USER_KEY);

		let offset = builder().sign(&digest, &user).await.unwrap();
		assert!(offset.v == 27 || offset.v == 28);

		let parity = builder()
			.with_v_convention(VConvention::YParity)
			.sign(&digest, &user)
			.await
			.unwrap();
		assert_eq!(parity.v, offset.v - 27);
		assert_eq!(
			builder().recover(&digest, &parity.as_bytes()).unwrap(),
			USER
		);
	}

	#[tokio::test]
	async fn test_wrong_signer_fails_self_verify() {
		let builder = builder();
		let request = hello_request(&builder, 0);

		let err = builder
			.sign_request(request, &wallet(OTHER_KEY))
			.await
			.unwrap_err();

		match err {
			ForwarderError::VerificationMismatch {
				expected,
				recovered,
			} => {
				assert_eq!(expected, USER);
				assert_eq!(
					recovered,
					address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
				);
			},
			other => panic!("unexpected error: {other}"),
		}
	}

	#[tokio::test]
	async fn test_self_verify_can_be_disabled() {
		let builder = builder().with_self_verify(false);
		let request = hello_request(&builder, 0);

		let signed = builder
			.sign_request(request, &wallet(OTHER_KEY))
			.await
			.unwrap();
		assert!(builder.self_verify(&signed).is_err());
	}

	#[test]
	fn test_malformed_signature_is_signature_error() {
		let builder = builder();
		let digest = keccak256(b"digest");

		assert!(matches!(
			builder.recover(&digest, &[0u8; 64]),
			Err(ForwarderError::Signature(_))
		));

		let mut bad_v = [1u8; 65];
		bad_v[64] = 9;
		assert!(matches!(
			builder.recover(&digest, &bad_v),
			Err(ForwarderError::Signature(_))
		));
	}
}
