//! Lifecycle of a relay attempt.
//!
//! Attempts move through Built -> Digested -> Signed -> (SelfVerified) ->
//! Submitted and end Confirmed or Reverted. State is kept in memory only.

pub mod attempt;

pub use attempt::{RelayAttempt, RelayState};
