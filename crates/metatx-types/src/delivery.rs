//! Transaction delivery types.
//!
//! This module defines types related to transaction submission and
//! monitoring, including transaction hashes, receipts and the raw logs
//! the relay flow inspects after confirmation.

use alloy_primitives::{Address, Bytes, B256};
use std::fmt;

/// Transaction hash of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A raw event log as returned in a receipt.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EventLog {
	/// Contract that emitted the log.
	pub address: Address,
	/// Indexed topics, the event signature hash first.
	pub topics: Vec<B256>,
	/// Non-indexed ABI-encoded data.
	pub data: Bytes,
}

/// Transaction receipt containing execution details.
///
/// Provides information about a transaction after it has been included in a block,
/// including its success status, block number and emitted logs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: TransactionHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Logs emitted during execution.
	pub logs: Vec<EventLog>,
}

/// A decoded `TextStored(address indexed user, string text)` event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextStoredEvent {
	/// Storage contract that emitted the event.
	pub contract: Address,
	/// The `_msgSender()` seen by the storage contract.
	pub user: Address,
	pub text: String,
}
