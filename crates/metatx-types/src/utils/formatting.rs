//! String formatting utilities.
//!
//! Hex prefix handling, short hash display and wei amounts for log output.

use alloy_primitives::U256;

/// Truncates a hex string for display, keeping the `0x` prefix and 8 digits.
pub fn truncate_hex(value: &str) -> String {
	let digits = without_0x_prefix(value);
	if digits.len() <= 8 {
		with_0x_prefix(digits)
	} else {
		format!("0x{}..", &digits[..8])
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.to_lowercase().starts_with("0x") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" or "0X" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Formats a wei amount as ether, trimming trailing zeros ("0.01", "1").
pub fn format_ether(wei: U256) -> String {
	const DECIMALS: usize = 18;
	let amount = wei.to_string();

	let (integer_part, decimal_part) = if amount.len() <= DECIMALS {
		("0".to_string(), format!("{:0>width$}", amount, width = DECIMALS))
	} else {
		let split = amount.len() - DECIMALS;
		(amount[..split].to_string(), amount[split..].to_string())
	};

	let decimal_trimmed = decimal_part.trim_end_matches('0');
	if decimal_trimmed.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, decimal_trimmed)
	}
}
