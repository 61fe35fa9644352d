//! Token lifecycle orchestration: the [`TokenManager`] facade.
//!
//! The manager owns the service directory, the credential store, the token client, the cache,
//! and the single-flight registry so each public operation in [`lifecycle`] stays a short
//! composition of those parts.

pub mod lifecycle;
pub mod singleflight;

mod metrics;

pub use lifecycle::*;
pub use metrics::RefreshMetrics;
pub use singleflight::SingleFlight;

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	cache::TokenCache,
	config::BrokerConfig,
	http::TokenHttpClient,
	oauth::{TokenClient, TransportErrorMapper},
	provider::ServiceDirectory,
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::{
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	store::{Cipher, FileStore},
};

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Brokers access tokens for every configured organization/service pair.
///
/// Clones share the cache, the single-flight registry, and the metrics, so one manager can be
/// handed to every request handler.
pub struct TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	directory: Arc<dyn ServiceDirectory>,
	store: Arc<dyn CredentialStore>,
	client: TokenClient<C, M>,
	config: BrokerConfig,
	cache: Arc<TokenCache>,
	inflight: Arc<SingleFlight<CredentialKey, TokenRecord>>,
	refresh_metrics: Arc<RefreshMetrics>,
}
impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a manager that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		directory: Arc<dyn ServiceDirectory>,
		store: Arc<dyn CredentialStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let config = BrokerConfig::default();

		Self {
			directory,
			store,
			client: TokenClient::new(http_client, mapper)
				.with_default_expires_in(config.default_expires_in),
			cache: Arc::new(TokenCache::new(config.fallback_ttl)),
			config,
			inflight: Default::default(),
			refresh_metrics: Default::default(),
		}
	}

	/// Applies `config` to the cache and the token client.
	///
	/// The cache is rebuilt, so call this before the manager is shared. The request timeout is
	/// the transport's concern and is not applied to caller-provided clients.
	pub fn with_config(mut self, config: BrokerConfig) -> Self {
		self.client = self.client.with_default_expires_in(config.default_expires_in);
		self.cache = Arc::new(TokenCache::new(config.fallback_ttl));
		self.config = config;

		self
	}

	/// Active configuration.
	pub fn config(&self) -> &BrokerConfig {
		&self.config
	}

	/// Shared token cache.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Shared credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Counters for upstream grant attempts.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		&self.refresh_metrics
	}

	/// Number of keys with a grant currently in flight.
	pub fn in_flight(&self) -> usize {
		self.inflight.len()
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a manager with its own reqwest transport, honoring `config.request_timeout`.
	pub fn new(
		directory: Arc<dyn ServiceDirectory>,
		store: Arc<dyn CredentialStore>,
		config: BrokerConfig,
	) -> Result<Self> {
		config.validate()?;

		let http_client = ReqwestHttpClient::with_timeout(config.request_timeout)?;

		Ok(Self::with_http_client(directory, store, http_client, ReqwestTransportErrorMapper)
			.with_config(config))
	}

	/// Same as [`TokenManager::new`] with an encrypted [`FileStore`] at `config.store_path`.
	pub fn with_file_store(
		directory: Arc<dyn ServiceDirectory>,
		cipher: Arc<dyn Cipher>,
		config: BrokerConfig,
	) -> Result<Self> {
		let store = FileStore::open(config.store_path.clone(), cipher)?;

		Self::new(directory, Arc::new(store), config)
	}
}
impl<C, M> Clone for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			directory: self.directory.clone(),
			store: self.store.clone(),
			client: self.client.clone(),
			config: self.config.clone(),
			cache: self.cache.clone(),
			inflight: self.inflight.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
		}
	}
}
impl<C, M> Debug for TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("config", &self.config)
			.field("cached", &self.cache.len())
			.field("in_flight", &self.inflight.len())
			.finish()
	}
}
