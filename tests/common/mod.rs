//! Helpers shared by the reqwest-backed integration tests.

// std
use std::sync::Arc;
// crates.io
use httpmock::MockServer;
// self
use token_broker::{
	auth::CredentialKey,
	config::BrokerConfig,
	flows::{ReqwestTokenManager, TokenManager},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	provider::{ServiceCredentials, ServiceDirectory, StaticDirectory},
	reqwest::Client,
	store::{CredentialStore, MemoryStore},
	url::Url,
};

/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by `httpmock`.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Credentials pointing at the mock server's `/token` endpoint.
pub fn mock_credentials(server: &MockServer) -> ServiceCredentials {
	let token_url =
		Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully.");

	ServiceCredentials::builder("mock-client", "mock-secret", token_url)
		.build()
		.expect("Mock credentials should validate.")
}

/// Builds a key from literal identifiers.
pub fn key(organization: &str, service: &str) -> CredentialKey {
	CredentialKey::parse(organization, service).expect("Fixture key should be valid.")
}

/// Constructs a [`TokenManager`] that resolves every pair in `pairs` to the mock server, backed
/// by an in-memory store.
pub fn build_reqwest_test_manager(
	server: &MockServer,
	pairs: &[(&str, &str)],
) -> (ReqwestTokenManager, Arc<MemoryStore>) {
	let mut directory = StaticDirectory::default();

	for (organization, service) in pairs {
		directory.insert(key(organization, service), mock_credentials(server));
	}

	let store = Arc::new(MemoryStore::default());
	let store_handle: Arc<dyn CredentialStore> = store.clone();
	let manager: ReqwestTokenManager = TokenManager::with_http_client(
		Arc::new(directory),
		store_handle,
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	);

	(manager, store)
}

/// Constructs a [`TokenManager`] over `store` that honors `config` while still trusting the
/// mock server's self-signed certificate.
pub fn build_configured_test_manager(
	directory: Arc<dyn ServiceDirectory>,
	store: Arc<dyn CredentialStore>,
	config: BrokerConfig,
) -> ReqwestTokenManager {
	config.validate().expect("Test config should be valid.");

	TokenManager::with_http_client(
		directory,
		store,
		test_reqwest_http_client(),
		ReqwestTransportErrorMapper,
	)
	.with_config(config)
}
