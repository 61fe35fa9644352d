// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
};
// crates.io
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	http::{StatusCode, header::AUTHORIZATION},
};
use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};
// self
use token_broker::{
	auth::{CredentialKey, TokenRecord},
	error::{Error, UpstreamError},
	flows::TokenManager,
	http::{HttpFuture, TokenHttpClient},
	oauth::TransportErrorMapper,
	provider::{GrantType, StaticDirectory},
	store::{CredentialStore, MemoryStore},
};

const DIRECTORY: &str = r#"{
	"organizations": {
		"org123": {
			"zohocrm": {
				"client_id": "zoho-client",
				"client_secret": "zoho secret",
				"token_url": "https://accounts.zoho.example/oauth/v2/token",
				"scope": "ZohoCRM.modules.ALL",
				"audience": "soid-42",
				"client_auth_method": "client_secret_basic"
			}
		}
	}
}"#;
const GRANT: &str =
	r#"{"access_token":"zoho-access","refresh_token":"zoho-refresh","expires_in":3600}"#;

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

/// Answers every request with the same outcome and remembers what was sent.
#[derive(Default)]
struct FakeHttpClient {
	throttled: bool,
	requests: Mutex<Vec<HttpRequest>>,
}
impl FakeHttpClient {
	fn throttled() -> Self {
		Self { throttled: true, ..Default::default() }
	}

	fn requests(&self) -> Vec<(Option<String>, String)> {
		self.requests
			.lock()
			.iter()
			.map(|request| {
				let authorization = request
					.headers()
					.get(AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned);

				(authorization, String::from_utf8_lossy(request.body()).into_owned())
			})
			.collect()
	}
}
impl TokenHttpClient for FakeHttpClient {
	type TransportError = FakeTransportError;

	fn execute(&self, request: HttpRequest) -> HttpFuture<'_, Self::TransportError> {
		self.requests.lock().push(request);

		let throttled = self.throttled;

		Box::pin(async move {
			if throttled {
				return Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)));
			}

			let mut response = HttpResponse::new(GRANT.as_bytes().to_vec());

			*response.status_mut() = StatusCode::OK;

			Ok(response)
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	grants: Arc<Mutex<Vec<GrantType>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded_grants(&self) -> Vec<GrantType> {
		self.grants.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		key: &CredentialKey,
		grant: GrantType,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		self.grants.lock().push(grant);

		Error::Upstream {
			key: key.clone(),
			source: UpstreamError::TokenEndpoint {
				message: format!("Fake transport error: {err}"),
				status: Some(429),
				retry_after: Some(Duration::seconds(5)),
			},
		}
	}
}

fn zoho_key() -> CredentialKey {
	CredentialKey::parse("org123", "zohocrm").expect("Fixture key should be valid.")
}

fn directory() -> Arc<StaticDirectory> {
	Arc::new(StaticDirectory::from_json_str(DIRECTORY).expect("Directory document should load."))
}

#[tokio::test]
async fn custom_transport_receives_service_specific_form() {
	let http_client = Arc::new(FakeHttpClient::default());
	let store = Arc::new(MemoryStore::default());
	let manager: TokenManager<FakeHttpClient, RecordingTransportErrorMapper> =
		TokenManager::with_http_client(
			directory(),
			store.clone(),
			http_client.clone(),
			RecordingTransportErrorMapper::default(),
		);
	let token = manager
		.get_valid_token("org123", "zohocrm")
		.await
		.expect("Fake transport should grant a token.");

	assert_eq!(token, "zoho-access");

	let requests = http_client.requests();
	let (authorization, body) = &requests[0];

	assert_eq!(requests.len(), 1);
	// "zoho secret" is form-encoded as "zoho+secret" before base64.
	assert_eq!(authorization.as_deref(), Some("Basic em9oby1jbGllbnQ6em9obytzZWNyZXQ="));
	assert!(body.contains("grant_type=client_credentials"));
	assert!(body.contains("scope=ZohoCRM.modules.ALL"));
	assert!(body.contains("soid=soid-42"));
	assert!(!body.contains("audience="));
	assert!(!body.contains("client_secret="), "Basic auth must keep the secret out of the body.");

	let stored = store
		.load(&zoho_key())
		.await
		.expect("Memory store load should succeed.")
		.expect("Grant should be persisted.");

	assert_eq!(stored.refresh_token.as_ref().map(|secret| secret.expose()), Some("zoho-refresh"));
}

#[tokio::test]
async fn transport_failures_go_through_the_mapper_for_both_grants() {
	let store = Arc::new(MemoryStore::default());
	let now = OffsetDateTime::now_utc();
	let expired = TokenRecord::builder()
		.access_token("stale")
		.refresh_token("stale-refresh")
		.issued_at(now - Duration::hours(2))
		.expires_at(now - Duration::minutes(1))
		.build()
		.expect("Expired record should build.");

	store.save(&zoho_key(), expired).await.expect("Seeding the store should succeed.");

	let http_client = Arc::new(FakeHttpClient::throttled());
	let mapper = Arc::new(RecordingTransportErrorMapper::default());
	let manager: TokenManager<FakeHttpClient, RecordingTransportErrorMapper> =
		TokenManager::with_http_client(directory(), store, http_client.clone(), mapper.clone());
	let err = manager
		.get_valid_token("org123", "zohocrm")
		.await
		.expect_err("Throttled transport should fail.");

	match err {
		Error::Upstream {
			key,
			source: UpstreamError::TokenEndpoint { status, retry_after, .. },
		} => {
			assert_eq!(key, zoho_key());
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	assert_eq!(
		mapper.recorded_grants(),
		vec![GrantType::RefreshToken, GrantType::ClientCredentials]
	);
	assert!(http_client.requests()[0].1.contains("refresh_token=stale-refresh"));
	assert_eq!(manager.refresh_metrics().failures(), 1);
}
