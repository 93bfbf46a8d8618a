//! Common types for the meta-transaction relay toolkit.
//!
//! This crate defines the value types shared by every other crate: forward
//! requests and their digests, signatures, contract bindings, network
//! configuration and delivery receipts.

/// ABI bindings for the forwarder and text storage contracts.
pub mod contracts;
/// Transaction delivery types for blockchain interactions.
pub mod delivery;
/// Forward requests, signing domains and signatures.
pub mod forward;
/// Network configuration types.
pub mod networks;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Zeroizing string for private keys.
pub mod secret_string;
/// Utility functions for encoding, parsing and formatting.
pub mod utils;
/// Configuration validation types for implementation tables.
pub mod validation;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use delivery::*;
pub use forward::{
	CodecError, DigestEncoding, ForwardRequest, ForwardSignature, ForwarderDomain, VConvention,
};
pub use networks::{NetworkConfig, NetworksConfig};
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use utils::{format_ether, truncate_hex, with_0x_prefix, without_0x_prefix};
pub use validation::*;
