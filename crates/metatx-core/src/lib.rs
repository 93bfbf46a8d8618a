//! Core of the meta-transaction relay.
//!
//! A user signs a [`ForwardRequest`](metatx_types::ForwardRequest) off-chain;
//! a relayer submits it to an EIP-2771 forwarder, which verifies the signature
//! and nonce before calling the target with the user appended as the
//! original sender. This crate builds and signs those requests
//! ([`MetaTransactionRequestBuilder`]), tracks each attempt through its
//! lifecycle ([`RelayAttempt`]) and drives submission ([`Relayer`]).

use metatx_account::AccountError;
use metatx_delivery::DeliveryError;
use metatx_types::{Address, Bytes, CodecError};
use thiserror::Error;

pub mod builder;
pub mod engine;
pub mod request;
pub mod state;

pub use builder::{BuilderError, RelayerBuilder, RelayerFactories};
pub use engine::{RelayOutcome, RelayReport, Relayer};
pub use request::{DigestedRequest, MetaTransactionRequestBuilder, SignedRequest};
pub use state::{RelayAttempt, RelayState};

/// Errors raised while building, signing and relaying forward requests.
#[derive(Debug, Error)]
pub enum ForwarderError {
	/// A value cannot be represented in the digest encoding.
	#[error("Encoding error: {0}")]
	Encoding(String),
	/// Signing failed or signature bytes are malformed.
	#[error("Signature error: {0}")]
	Signature(String),
	/// The signature recovers to someone other than `request.from`.
	#[error("Signature recovers to {recovered}, expected {expected}")]
	VerificationMismatch {
		expected: Address,
		recovered: Address,
	},
	/// The forwarder or node refused the request. Holds the remote message
	/// verbatim along with any revert data the node returned.
	#[error("Remote rejection: {message}{}", .data.as_ref().map(|data| format!(" (revert data: {})", data)).unwrap_or_default())]
	RemoteRejection {
		message: String,
		data: Option<Bytes>,
	},
	#[error("Invalid state transition from {from:?} to {to:?}")]
	InvalidTransition { from: RelayState, to: RelayState },
	/// Transport failure talking to the chain.
	#[error("Delivery error: {0}")]
	Delivery(String),
}

impl From<CodecError> for ForwarderError {
	fn from(err: CodecError) -> Self {
		match err {
			CodecError::InvalidSignatureLength(_)
			| CodecError::InvalidRecoveryByte(_)
			| CodecError::Recovery(_) => ForwarderError::Signature(err.to_string()),
			_ => ForwarderError::Encoding(err.to_string()),
		}
	}
}

impl From<AccountError> for ForwarderError {
	fn from(err: AccountError) -> Self {
		ForwarderError::Signature(err.to_string())
	}
}

impl From<DeliveryError> for ForwarderError {
	fn from(err: DeliveryError) -> Self {
		match err {
			DeliveryError::Rejected { message, data } => {
				ForwarderError::RemoteRejection { message, data }
			},
			other => ForwarderError::Delivery(other.to_string()),
		}
	}
}
