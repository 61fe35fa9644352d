//! Broker-level error types shared across flows, providers, and stores.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecordBuilderError, ValidationError},
	provider::GrantType,
	store::StoreError,
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shareable boxed error; keeps [`Error`] cloneable so single-flight waiters can share failures.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Organization or service identifier is malformed.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Storage-layer failure.
	#[error("{source}")]
	Storage {
		/// Pair whose record was being read or written; `None` for whole-store operations.
		key: Option<CredentialKey>,
		/// Underlying store failure.
		#[source]
		source: StoreError,
	},
	/// Local configuration problem.
	#[error("{source}")]
	Config {
		/// Pair whose request could not be prepared; `None` for broker-wide settings.
		key: Option<CredentialKey>,
		/// Underlying configuration failure.
		#[source]
		source: ConfigError,
	},

	/// The service directory does not know the requested pair.
	#[error("No OAuth configuration found for `{key}`.")]
	NotFound {
		/// Requested organization/service pair.
		key: CredentialKey,
	},
	/// The token endpoint rejected the client or the grant, or returned no access token.
	#[error("Authentication failed for `{key}` during the {grant} grant: {reason}.")]
	Authentication {
		/// Affected organization/service pair.
		key: CredentialKey,
		/// Grant that was rejected.
		grant: GrantType,
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// The token endpoint failed in a way that is not an authentication rejection.
	#[error("Token endpoint failed for `{key}`.")]
	Upstream {
		/// Affected organization/service pair.
		key: CredentialKey,
		/// Upstream failure detail.
		#[source]
		source: UpstreamError,
	},
	/// The token endpoint could not be reached.
	#[error("Token endpoint is unreachable for `{key}`.")]
	Transport {
		/// Affected organization/service pair.
		key: CredentialKey,
		/// Transport failure detail.
		#[source]
		source: TransportError,
	},
}
impl Error {
	/// Attributes a store failure to `key`.
	pub fn storage(key: &CredentialKey, source: StoreError) -> Self {
		Self::Storage { key: Some(key.clone()), source }
	}

	/// Attributes a configuration failure to `key`.
	pub fn config(key: &CredentialKey, source: impl Into<ConfigError>) -> Self {
		Self::Config { key: Some(key.clone()), source: source.into() }
	}

	/// Credential key the failure is attributed to, when there is one.
	pub fn key(&self) -> Option<&CredentialKey> {
		match self {
			Self::NotFound { key }
			| Self::Authentication { key, .. }
			| Self::Upstream { key, .. }
			| Self::Transport { key, .. }
			| Self::Storage { key: Some(key), .. }
			| Self::Config { key: Some(key), .. } => Some(key),
			_ => None,
		}
	}
}
impl From<StoreError> for Error {
	fn from(source: StoreError) -> Self {
		Self::Storage { key: None, source }
	}
}
impl From<ConfigError> for Error {
	fn from(source: ConfigError) -> Self {
		Self::Config { key: None, source }
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<oauth2::http::Error>,
	},
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] TokenRecordBuilderError),
	/// A configuration value is out of range.
	#[error("Setting `{name}` is invalid: {reason}.")]
	InvalidSetting {
		/// Setting name.
		name: &'static str,
		/// Human-readable reason.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<oauth2::http::Error> for ConfigError {
	fn from(e: oauth2::http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Non-authentication failures reported by the token endpoint.
#[derive(Clone, Debug, ThisError)]
pub enum UpstreamError {
	/// Provider returned an unexpected response or timed out.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl UpstreamError {
	/// HTTP status attached to the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenEndpoint { status, .. } | Self::TokenResponseParse { status, .. } => *status,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[source] Arc<std::io::Error>),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
