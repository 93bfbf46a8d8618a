//! Utility functions for common type conversions and transformations.
//!
//! This module provides EIP-712 encoding helpers, parsing of user-supplied
//! values and string formatting used throughout the relay toolkit.

pub mod conversion;
pub mod eip712;
pub mod formatting;

pub use conversion::{parse_address, parse_chain_id, parse_hex_bytes, parse_u256};
pub use eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, DOMAIN_TYPE,
	FORWARD_REQUEST_TYPE, NAME_MINIMAL_FORWARDER, VERSION_MINIMAL_FORWARDER,
};
pub use formatting::{format_ether, truncate_hex, with_0x_prefix, without_0x_prefix};
