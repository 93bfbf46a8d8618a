//! Forward request, signing domain and signature types.
//!
//! A [`ForwardRequest`] is the value an EIP-2771 forwarder verifies and
//! executes on behalf of `from`. Two digests can be produced for it:
//! the EIP-712 typed-data digest and a packed keccak digest for forwarders
//! that hash the fields manually. Whichever the forwarder recomputes is the
//! one that must be signed.

use crate::utils::eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, FORWARD_REQUEST_TYPE,
	NAME_MINIMAL_FORWARDER, VERSION_MINIMAL_FORWARDER,
};
use crate::utils::{parse_address, parse_chain_id};
use alloy_primitives::{keccak256, Address, Bytes, PrimitiveSignature, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while encoding requests or decoding signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
	#[error("Invalid address: {0}")]
	InvalidAddress(String),
	#[error("Invalid uint256: {0}")]
	InvalidUint(String),
	#[error("Invalid hex data: {0}")]
	InvalidHex(String),
	#[error("Invalid chain id: {0}")]
	InvalidChainId(String),
	#[error("Invalid signature length: expected 65 bytes, got {0}")]
	InvalidSignatureLength(usize),
	#[error("Invalid signature recovery byte: {0}")]
	InvalidRecoveryByte(u8),
	#[error("Signature recovery failed: {0}")]
	Recovery(String),
}

/// A meta-transaction forward request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
	/// Original signer on whose behalf the call executes.
	pub from: Address,
	/// Target contract.
	pub to: Address,
	/// Native value forwarded with the call.
	pub value: U256,
	/// Gas limit for the forwarded call.
	pub gas: U256,
	/// Forwarder nonce for `from` at build time.
	pub nonce: U256,
	/// ABI-encoded call payload for `to`.
	pub data: Bytes,
}

impl ForwardRequest {
	pub fn new(
		from: Address,
		to: Address,
		value: U256,
		gas: U256,
		nonce: U256,
		data: Bytes,
	) -> Self {
		Self {
			from,
			to,
			value,
			gas,
			nonce,
			data,
		}
	}

	/// EIP-712 struct hash of this request.
	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&keccak256(FORWARD_REQUEST_TYPE.as_bytes()));
		enc.push_address(&self.from);
		enc.push_address(&self.to);
		enc.push_u256(self.value);
		enc.push_u256(self.gas);
		enc.push_u256(self.nonce);
		enc.push_bytes_hash(&self.data);
		keccak256(enc.finish())
	}

	/// EIP-712 typed-data digest under `domain`.
	pub fn eip712_digest(&self, domain: &ForwarderDomain) -> B256 {
		compute_final_digest(&domain.separator(), &self.struct_hash())
	}

	/// Packed digest:
	/// `keccak256(from || to || pad32(value) || pad32(gas) || pad32(nonce) || keccak256(data))`.
	///
	/// Addresses contribute their raw 20 bytes.
	pub fn packed_digest(&self) -> B256 {
		let mut buf = Vec::with_capacity(20 + 20 + 32 * 4);
		buf.extend_from_slice(self.from.as_slice());
		buf.extend_from_slice(self.to.as_slice());
		buf.extend_from_slice(&self.value.to_be_bytes::<32>());
		buf.extend_from_slice(&self.gas.to_be_bytes::<32>());
		buf.extend_from_slice(&self.nonce.to_be_bytes::<32>());
		buf.extend_from_slice(keccak256(&self.data).as_slice());
		keccak256(buf)
	}

	/// Digest under the selected encoding.
	pub fn digest(&self, encoding: DigestEncoding, domain: &ForwarderDomain) -> B256 {
		match encoding {
			DigestEncoding::Eip712 => self.eip712_digest(domain),
			DigestEncoding::Packed => self.packed_digest(),
		}
	}
}

/// Which digest the verifying contract recomputes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestEncoding {
	/// Full EIP-712 typed-data hashing.
	#[default]
	Eip712,
	/// Manual keccak over packed fields.
	Packed,
}

impl fmt::Display for DigestEncoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DigestEncoding::Eip712 => write!(f, "eip712"),
			DigestEncoding::Packed => write!(f, "packed"),
		}
	}
}

impl std::str::FromStr for DigestEncoding {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"eip712" | "eip-712" => Ok(DigestEncoding::Eip712),
			"packed" | "custom" => Ok(DigestEncoding::Packed),
			other => Err(format!("Unknown digest encoding '{}'", other)),
		}
	}
}

/// EIP-712 domain of the verifying forwarder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl ForwarderDomain {
	pub fn new(
		name: impl Into<String>,
		version: impl Into<String>,
		chain_id: u64,
		verifying_contract: Address,
	) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
			chain_id,
			verifying_contract,
		}
	}

	/// Domain of an OpenZeppelin `MinimalForwarder` ("MinimalForwarder", "0.0.1").
	pub fn minimal_forwarder(chain_id: u64, verifying_contract: Address) -> Self {
		Self::new(
			NAME_MINIMAL_FORWARDER,
			VERSION_MINIMAL_FORWARDER,
			chain_id,
			verifying_contract,
		)
	}

	/// Builds a domain from textual chain id and contract address.
	pub fn parse(
		name: &str,
		version: &str,
		chain_id: &str,
		verifying_contract: &str,
	) -> Result<Self, CodecError> {
		Ok(Self::new(
			name,
			version,
			parse_chain_id(chain_id)?,
			parse_address(verifying_contract)?,
		))
	}

	/// The domain separator hash.
	pub fn separator(&self) -> B256 {
		compute_domain_hash(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
	}
}

/// Encoding of the recovery byte `v`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VConvention {
	/// v in {27, 28}, what `ecrecover` and OpenZeppelin's ECDSA expect.
	#[default]
	Offset27,
	/// v in {0, 1}, the raw y-parity.
	YParity,
}

/// A 65-byte recoverable ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardSignature {
	pub r: B256,
	pub s: B256,
	pub v: u8,
}

impl ForwardSignature {
	pub const LENGTH: usize = 65;

	/// Parses `r || s || v`. Accepts v in {0, 1, 27, 28}.
	pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
		if bytes.len() != Self::LENGTH {
			return Err(CodecError::InvalidSignatureLength(bytes.len()));
		}
		let signature = Self {
			r: B256::from_slice(&bytes[..32]),
			s: B256::from_slice(&bytes[32..64]),
			v: bytes[64],
		};
		signature.y_parity()?;
		Ok(signature)
	}

	/// The y-parity bit encoded by `v`.
	pub fn y_parity(&self) -> Result<bool, CodecError> {
		match self.v {
			0 | 27 => Ok(false),
			1 | 28 => Ok(true),
			other => Err(CodecError::InvalidRecoveryByte(other)),
		}
	}

	/// Returns a copy with `v` rewritten to `convention`.
	pub fn normalized(&self, convention: VConvention) -> Result<Self, CodecError> {
		let parity = self.y_parity()? as u8;
		let v = match convention {
			VConvention::Offset27 => 27 + parity,
			VConvention::YParity => parity,
		};
		Ok(Self { v, ..*self })
	}

	/// `r || s || v`.
	pub fn as_bytes(&self) -> [u8; 65] {
		let mut out = [0u8; 65];
		out[..32].copy_from_slice(self.r.as_slice());
		out[32..64].copy_from_slice(self.s.as_slice());
		out[64] = self.v;
		out
	}

	pub fn to_bytes(&self) -> Bytes {
		Bytes::copy_from_slice(&self.as_bytes())
	}

	/// Recovers the signer of `digest`.
	pub fn recover_address(&self, digest: &B256) -> Result<Address, CodecError> {
		let signature = PrimitiveSignature::new(
			U256::from_be_bytes(self.r.0),
			U256::from_be_bytes(self.s.0),
			self.y_parity()?,
		);
		signature
			.recover_address_from_prehash(digest)
			.map_err(|e| CodecError::Recovery(e.to_string()))
	}
}

impl fmt::Display for ForwardSignature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.as_bytes()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contracts;
	use alloy_primitives::address;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use alloy_sol_types::{eip712_domain, SolStruct};

	const USER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
	const FORWARDER: Address = address!("06e698E439701dd6ed543E3f715cB8f0978d07e7");
	const STORAGE: Address = address!("F38333e5DA5469FD497e27F504A620D96615D967");

	fn sample_request(from: Address) -> ForwardRequest {
		ForwardRequest::new(
			from,
			STORAGE,
			U256::ZERO,
			U256::from(1_000_000u64),
			U256::ZERO,
			contracts::encode_store_text("hello"),
		)
	}

	#[test]
	fn test_eip712_digest_matches_sol_struct_hashing() {
		let request = sample_request(address!("70997970C51812dc3A010C7d01b50e0d17dc79C8"));
		let domain = ForwarderDomain::minimal_forwarder(11155111, FORWARDER);

		let alloy_domain = eip712_domain! {
			name: "MinimalForwarder",
			version: "0.0.1",
			chain_id: 11155111,
			verifying_contract: FORWARDER,
		};
		let sol_request = contracts::ForwardRequest::from(&request);

		assert_eq!(domain.separator(), alloy_domain.separator());
		assert_eq!(request.struct_hash(), sol_request.eip712_hash_struct());
		assert_eq!(
			request.eip712_digest(&domain),
			sol_request.eip712_signing_hash(&alloy_domain)
		);
	}

	#[test]
	fn test_packed_digest_layout() {
		let request = sample_request(Address::repeat_byte(0x11));

		let mut expected = Vec::new();
		expected.extend_from_slice(&[0x11; 20]);
		expected.extend_from_slice(STORAGE.as_slice());
		expected.extend_from_slice(&[0u8; 32]);
		expected.extend_from_slice(&U256::from(1_000_000u64).to_be_bytes::<32>());
		expected.extend_from_slice(&[0u8; 32]);
		expected.extend_from_slice(keccak256(&request.data).as_slice());

		assert_eq!(expected.len(), 168);
		assert_eq!(request.packed_digest(), keccak256(&expected));
	}

	#[test]
	fn test_signature_roundtrip_and_recovery() {
		let signer: PrivateKeySigner = USER_KEY.parse().unwrap();
		let request = sample_request(signer.address());
		let domain = ForwarderDomain::minimal_forwarder(11155111, FORWARDER);
		let digest = request.eip712_digest(&domain);

		let raw = signer.sign_hash_sync(&digest).unwrap();
		let signature = ForwardSignature::from_slice(&raw.as_bytes()).unwrap();

		assert_eq!(signature.recover_address(&digest).unwrap(), signer.address());
		assert_eq!(
			ForwardSignature::from_slice(&signature.as_bytes()).unwrap(),
			signature
		);
	}

	#[test]
	fn test_v_normalization() {
		let signature = ForwardSignature {
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(2),
			v: 28,
		};

		let parity = signature.normalized(VConvention::YParity).unwrap();
		assert_eq!(parity.v, 1);
		assert_eq!(parity.normalized(VConvention::Offset27).unwrap().v, 28);

		let bad = ForwardSignature { v: 5, ..signature };
		assert_eq!(
			bad.normalized(VConvention::Offset27),
			Err(CodecError::InvalidRecoveryByte(5))
		);
	}

	#[test]
	fn test_recovery_is_convention_independent() {
		let signer: PrivateKeySigner = USER_KEY.parse().unwrap();
		let digest = keccak256(b"digest");
		let raw = signer.sign_hash_sync(&digest).unwrap();
		let signature = ForwardSignature::from_slice(&raw.as_bytes()).unwrap();

		let parity = signature.normalized(VConvention::YParity).unwrap();
		assert_eq!(parity.recover_address(&digest).unwrap(), signer.address());
	}

	#[test]
	fn test_signature_length_checked() {
		assert_eq!(
			ForwardSignature::from_slice(&[0u8; 64]),
			Err(CodecError::InvalidSignatureLength(64))
		);
	}

	#[test]
	fn test_domain_parse() {
		let domain = ForwarderDomain::parse(
			"MinimalForwarder",
			"0.0.1",
			"11155111",
			"0x06e698E439701dd6ed543E3f715cB8f0978d07e7",
		)
		.unwrap();
		assert_eq!(domain, ForwarderDomain::minimal_forwarder(11155111, FORWARDER));

		let bad_chain = ForwarderDomain::parse(
			"MinimalForwarder",
			"0.0.1",
			"-1",
			"0x06e698E439701dd6ed543E3f715cB8f0978d07e7",
		);
		assert!(matches!(bad_chain, Err(CodecError::InvalidChainId(_))));

		let bad_address = ForwarderDomain::parse("MinimalForwarder", "0.0.1", "1", "0x1234");
		assert!(matches!(bad_address, Err(CodecError::InvalidAddress(_))));
	}

	#[test]
	fn test_encoding_from_str() {
		assert_eq!("EIP712".parse::<DigestEncoding>(), Ok(DigestEncoding::Eip712));
		assert_eq!("packed".parse::<DigestEncoding>(), Ok(DigestEncoding::Packed));
		assert!("rlp".parse::<DigestEncoding>().is_err());
	}
}
