//! Parsing helpers for user- and config-supplied values.
//!
//! Every helper reports failures as [`CodecError`] so that callers can
//! surface them as encoding errors before anything is hashed or signed.

use super::formatting::without_0x_prefix;
use crate::CodecError;
use alloy_primitives::{hex, Address, Bytes, U256};

/// Parses a 20-byte hex address (with or without "0x").
pub fn parse_address(value: &str) -> Result<Address, CodecError> {
	let trimmed = value.trim();
	let digits = without_0x_prefix(trimmed);
	if digits.len() != 40 {
		return Err(CodecError::InvalidAddress(format!(
			"expected 40 hex digits, got {} in '{}'",
			digits.len(),
			trimmed
		)));
	}
	digits
		.parse::<Address>()
		.map_err(|e| CodecError::InvalidAddress(format!("'{}': {}", trimmed, e)))
}

/// Parses a decimal or 0x-prefixed hex uint256.
pub fn parse_u256(value: &str) -> Result<U256, CodecError> {
	let trimmed = value.trim();
	let parsed = if let Some(digits) = trimmed
		.strip_prefix("0x")
		.or_else(|| trimmed.strip_prefix("0X"))
	{
		U256::from_str_radix(digits, 16)
	} else {
		U256::from_str_radix(trimmed, 10)
	};
	parsed.map_err(|e| CodecError::InvalidUint(format!("'{}': {}", trimmed, e)))
}

/// Parses hex calldata. "0x" and "" both yield empty bytes.
pub fn parse_hex_bytes(value: &str) -> Result<Bytes, CodecError> {
	hex::decode(without_0x_prefix(value.trim()))
		.map(Bytes::from)
		.map_err(|e| CodecError::InvalidHex(e.to_string()))
}

/// Parses a chain id, which must fit an unsigned 64-bit integer.
pub fn parse_chain_id(value: &str) -> Result<u64, CodecError> {
	let trimmed = value.trim();
	trimmed
		.parse::<u64>()
		.map_err(|e| CodecError::InvalidChainId(format!("'{}': {}", trimmed, e)))
}
