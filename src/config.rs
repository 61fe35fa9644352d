//! Tunables for the token manager.
//!
//! Values deserialize from any serde format with every field optional; durations are whole
//! seconds. Reading the configuration source itself is left to the embedding program.

// std
use std::path::PathBuf;
// self
use crate::{_prelude::*, cache::DEFAULT_FALLBACK_TTL, error::ConfigError};

/// Default location of the credential store document.
pub const DEFAULT_STORE_PATH: &str = "data/tokens.json";
/// Default timeout for one token endpoint request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(10);
/// Default minimum remaining validity for a cached token to be served.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::seconds(60);
/// Default lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::hours(1);

/// Token manager configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
	/// Path of the encrypted credential store document.
	pub store_path: PathBuf,
	/// Timeout applied to every token endpoint request.
	#[serde(with = "seconds")]
	pub request_timeout: Duration,
	/// Cached tokens are refreshed once their remaining validity drops to this margin.
	#[serde(with = "seconds")]
	pub expiry_margin: Duration,
	/// Cache TTL used when the computed one is not positive.
	#[serde(with = "seconds")]
	pub fallback_ttl: Duration,
	/// Lifetime assumed when a token response carries no usable `expires_in`.
	#[serde(with = "seconds")]
	pub default_expires_in: Duration,
}
impl BrokerConfig {
	/// Checks that every duration is in range.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.request_timeout.is_positive() {
			return Err(invalid("request_timeout", "must be positive"));
		}
		if self.expiry_margin.is_negative() {
			return Err(invalid("expiry_margin", "cannot be negative"));
		}
		if !self.fallback_ttl.is_positive() {
			return Err(invalid("fallback_ttl", "must be positive"));
		}
		if !self.default_expires_in.is_positive() {
			return Err(invalid("default_expires_in", "must be positive"));
		}
		if self.store_path.as_os_str().is_empty() {
			return Err(invalid("store_path", "cannot be empty"));
		}

		Ok(())
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			store_path: PathBuf::from(DEFAULT_STORE_PATH),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			expiry_margin: DEFAULT_EXPIRY_MARGIN,
			fallback_ttl: DEFAULT_FALLBACK_TTL,
			default_expires_in: DEFAULT_EXPIRES_IN,
		}
	}
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
	ConfigError::InvalidSetting { name, reason: reason.into() }
}

mod seconds {
	// crates.io
	use serde::{Deserializer, Serializer};
	// self
	use crate::_prelude::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
