//! Relay attempt state machine.

use crate::ForwarderError;
use metatx_types::{Address, TransactionHash, U256};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Where a relay attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayState {
	Built,
	Digested,
	Signed,
	SelfVerified,
	Submitted,
	Confirmed,
	Reverted,
}

impl fmt::Display for RelayState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			RelayState::Built => "built",
			RelayState::Digested => "digested",
			RelayState::Signed => "signed",
			RelayState::SelfVerified => "self_verified",
			RelayState::Submitted => "submitted",
			RelayState::Confirmed => "confirmed",
			RelayState::Reverted => "reverted",
		};
		f.write_str(name)
	}
}

impl RelayState {
	/// Confirmed and Reverted accept no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, RelayState::Confirmed | RelayState::Reverted)
	}

	/// Checks if a state transition is valid
	pub fn can_transition_to(&self, to: RelayState) -> bool {
		// Static transition table - each state maps to allowed next states
		static TRANSITIONS: Lazy<HashMap<RelayState, HashSet<RelayState>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(RelayState::Built, HashSet::from([RelayState::Digested]));
			m.insert(RelayState::Digested, HashSet::from([RelayState::Signed]));
			m.insert(
				RelayState::Signed,
				HashSet::from([RelayState::SelfVerified, RelayState::Submitted]),
			);
			m.insert(
				RelayState::SelfVerified,
				HashSet::from([RelayState::Submitted]),
			);
			m.insert(
				RelayState::Submitted,
				HashSet::from([RelayState::Confirmed, RelayState::Reverted]),
			);
			m.insert(RelayState::Confirmed, HashSet::new()); // terminal
			m.insert(RelayState::Reverted, HashSet::new()); // terminal
			m
		});

		TRANSITIONS
			.get(self)
			.is_some_and(|allowed| allowed.contains(&to))
	}
}

/// One attempt to relay one forward request.
#[derive(Debug, Clone)]
pub struct RelayAttempt {
	from: Address,
	nonce: U256,
	state: RelayState,
	history: Vec<RelayState>,
	tx_hash: Option<TransactionHash>,
}

impl RelayAttempt {
	/// Starts an attempt for the request signed by `from` at `nonce`.
	pub fn new(from: Address, nonce: U256) -> Self {
		Self {
			from,
			nonce,
			state: RelayState::Built,
			history: vec![RelayState::Built],
			tx_hash: None,
		}
	}

	pub fn signer(&self) -> Address {
		self.from
	}

	pub fn nonce(&self) -> U256 {
		self.nonce
	}

	pub fn state(&self) -> RelayState {
		self.state
	}

	/// Every state visited, starting with Built.
	pub fn history(&self) -> &[RelayState] {
		&self.history
	}

	/// Hash of the `execute` transaction once submitted.
	pub fn tx_hash(&self) -> Option<TransactionHash> {
		self.tx_hash
	}

	/// Moves to `to`, rejecting transitions the lifecycle does not allow.
	pub fn transition(&mut self, to: RelayState) -> Result<(), ForwarderError> {
		if !self.state.can_transition_to(to) {
			tracing::warn!(
				from = %self.from,
				nonce = %self.nonce,
				state = %self.state,
				to = %to,
				"Rejected relay state transition"
			);
			return Err(ForwarderError::InvalidTransition {
				from: self.state,
				to,
			});
		}

		tracing::debug!(
			from = %self.from,
			nonce = %self.nonce,
			"Relay attempt {} -> {}",
			self.state,
			to
		);
		self.state = to;
		self.history.push(to);
		Ok(())
	}

	/// Records the transaction hash and moves to Submitted.
	pub fn mark_submitted(&mut self, hash: TransactionHash) -> Result<(), ForwarderError> {
		self.transition(RelayState::Submitted)?;
		self.tx_hash = Some(hash);
		Ok(())
	}
}
