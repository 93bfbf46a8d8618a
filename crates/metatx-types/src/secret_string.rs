//! Zeroizing wrapper for private keys loaded from configuration.
//!
//! Keys enter the process through config files and environment variables.
//! `SecretString` keeps them out of `Debug`/`Display` output and wipes the
//! buffer on drop.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

const REDACTED: &str = "***REDACTED***";

/// A string whose contents are wiped on drop and never printed.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Returns the secret value.
	///
	/// Callers must not log or persist the returned slice.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	/// Runs `f` with the secret, limiting the scope where it is visible.
	pub fn with_exposed<F, R>(&self, f: F) -> R
	where
		F: FnOnce(&str) -> R,
	{
		f(&self.0)
	}

	pub fn is_empty(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({})", REDACTED)
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.0.as_str() == other.0.as_str()
	}
}

impl Eq for SecretString {}

// Serializing never writes the secret back out.
impl Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		String::deserialize(deserializer).map(SecretString::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	#[test]
	fn test_key_never_formatted() {
		let secret = SecretString::from(KEY);
		assert_eq!(format!("{:?}", secret), "SecretString(***REDACTED***)");
		assert_eq!(format!("{}", secret), "***REDACTED***");
		assert_eq!(serde_json::to_string(&secret).unwrap(), "\"***REDACTED***\"");
	}

	#[test]
	fn test_expose() {
		let secret = SecretString::from(KEY);
		assert_eq!(secret.expose_secret(), KEY);
		assert_eq!(secret.with_exposed(|s| s.len()), 66);
	}

	#[test]
	fn test_blank_is_empty() {
		assert!(SecretString::from("  ").is_empty());
		assert!(!SecretString::from(KEY).is_empty());
	}
}
