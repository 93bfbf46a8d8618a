//! ABI bindings for the forwarder and text storage contracts.
//!
//! Only the external surface the relay flow touches is declared here. The
//! contracts themselves are deployed and owned elsewhere.

use crate::{EventLog, ForwardRequest as Request, TextStoredEvent};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolCall, SolEvent};

sol! {
	/// On-chain layout of a forward request as passed to `execute`.
	#[derive(Debug, PartialEq, Eq)]
	struct ForwardRequest {
		address from;
		address to;
		uint256 value;
		uint256 gas;
		uint256 nonce;
		bytes data;
	}

	interface IMinimalForwarder {
		function getNonce(address from) external view returns (uint256);
		function verify(ForwardRequest calldata req, bytes calldata signature) external view returns (bool);
		function execute(ForwardRequest calldata req, bytes calldata signature) external payable returns (bool, bytes memory);
	}

	interface ITextStorage {
		event TextStored(address indexed user, string text);
		function storeText(string calldata text) external;
		function texts(address owner, uint256 index) external view returns (string memory);
	}
}

impl From<&Request> for ForwardRequest {
	fn from(req: &Request) -> Self {
		Self {
			from: req.from,
			to: req.to,
			value: req.value,
			gas: req.gas,
			nonce: req.nonce,
			data: req.data.clone(),
		}
	}
}

/// ABI-encodes a `storeText(string)` call.
pub fn encode_store_text(text: &str) -> Bytes {
	ITextStorage::storeTextCall {
		text: text.to_string(),
	}
	.abi_encode()
	.into()
}

/// Decodes `storeText(string)` calldata, returning `None` for any other payload.
pub fn decode_store_text(data: &[u8]) -> Option<String> {
	ITextStorage::storeTextCall::abi_decode(data, true)
		.ok()
		.map(|call| call.text)
}

/// Builds the raw log a TextStorage contract emits for `storeText`.
pub fn text_stored_log(contract: Address, user: Address, text: &str) -> EventLog {
	let event = ITextStorage::TextStored {
		user,
		text: text.to_string(),
	};
	let data = event.encode_log_data();
	EventLog {
		address: contract,
		topics: data.topics().to_vec(),
		data: data.data,
	}
}

/// Decodes a `TextStored` event from a raw log.
///
/// Returns `None` when the log has a different signature or is malformed.
pub fn decode_text_stored(log: &EventLog) -> Option<TextStoredEvent> {
	if log.topics.first() != Some(&ITextStorage::TextStored::SIGNATURE_HASH) {
		return None;
	}
	ITextStorage::TextStored::decode_raw_log(log.topics.iter().copied(), &log.data, true)
		.ok()
		.map(|event| TextStoredEvent {
			contract: log.address,
			user: event.user,
			text: event.text,
		})
}
