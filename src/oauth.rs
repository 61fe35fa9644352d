//! OAuth token client: the refresh-token grant with client-credentials fallback.
//!
//! Requests are plain `application/x-www-form-urlencoded` POSTs built on the `oauth2` crate's
//! `http` types. Responses are parsed leniently (`token_type` and `expires_in` are optional)
//! because several providers omit them.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	HttpClientError, HttpRequest, HttpResponse,
	basic::BasicErrorResponse,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded::{Serializer as FormSerializer, byte_serialize};
// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord, TokenSecret},
	config::DEFAULT_EXPIRES_IN,
	error::{ConfigError, TransportError, UpstreamError},
	http::{self, TokenHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{
		ClientAuthMethod, FailureKind, GrantType, ServiceCredentials, TokenErrorContext,
		classify_token_error,
	},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a broker error.
	fn map_transport_error(
		&self,
		key: &CredentialKey,
		grant: GrantType,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		key: &CredentialKey,
		_grant: GrantType,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(key, *inner),
			HttpClientError::Http(inner) => Error::config(key, inner),
			HttpClientError::Io(inner) =>
				Error::Transport { key: key.clone(), source: TransportError::from(inner) },
			HttpClientError::Other(message) => map_generic_transport_error(key, message),
			_ => map_generic_transport_error(key, "unknown transport failure"),
		}
	}
}

/// Token endpoint response body; every field is optional so failures can be diagnosed.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenEndpointResponse {
	access_token: Option<String>,
	refresh_token: Option<String>,
	expires_in: Option<ExpiresIn>,
	error: Option<String>,
	error_description: Option<String>,
}

/// `expires_in` as sent on the wire; some providers quote the number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Seconds(i64),
	Text(String),
	Other(serde::de::IgnoredAny),
}
impl ExpiresIn {
	fn seconds(&self) -> Option<i64> {
		match self {
			Self::Seconds(secs) => Some(*secs),
			Self::Text(text) => text.trim().parse().ok(),
			Self::Other(_) => None,
		}
	}
}

/// Issues token requests against a service's token endpoint.
pub struct TokenClient<C, M>
where
	C: ?Sized,
	M: ?Sized,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
	default_expires_in: Duration,
}
impl<C, M> TokenClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http_client: http_client.into(),
			error_mapper: error_mapper.into(),
			default_expires_in: DEFAULT_EXPIRES_IN,
		}
	}

	/// Overrides the lifetime assumed when a response has no usable `expires_in`.
	pub fn with_default_expires_in(mut self, lifetime: Duration) -> Self {
		if lifetime.is_positive() {
			self.default_expires_in = lifetime;
		}

		self
	}

	/// Obtains a new grant for `key`.
	///
	/// When `existing` carries a refresh token the refresh grant is attempted first; any failure
	/// of that attempt falls back to the client-credentials grant, whose failure is returned.
	pub async fn refresh(
		&self,
		key: &CredentialKey,
		credentials: &ServiceCredentials,
		existing: Option<&TokenRecord>,
	) -> Result<TokenRecord> {
		if let Some(refresh_token) = existing.and_then(|record| record.refresh_token.as_ref()) {
			match self.exchange_refresh_token(key, credentials, refresh_token).await {
				Ok(record) => return Ok(record),
				Err(e) => obs::record_refresh_fallback(key, &e),
			}
		}

		self.exchange_client_credentials(key, credentials).await
	}

	/// Runs the client-credentials grant.
	pub async fn exchange_client_credentials(
		&self,
		key: &CredentialKey,
		credentials: &ServiceCredentials,
	) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::ClientCredentials;

		let span = FlowSpan::new(KIND, "exchange_client_credentials", key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut form = vec![("grant_type", GrantType::ClientCredentials.as_str())];

				if let Some(scope) = credentials.scope() {
					form.push(("scope", scope));
				}
				if let Some(audience) = credentials.audience() {
					form.push((credentials.kind_for(&key.service).audience_param(), audience));
				}

				let grant = GrantType::ClientCredentials;

				self.request_token(key, credentials, grant, &form, None).await
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	/// Runs the refresh-token grant, retaining `refresh_token` if the response omits a new one.
	pub async fn exchange_refresh_token(
		&self,
		key: &CredentialKey,
		credentials: &ServiceCredentials,
		refresh_token: &TokenSecret,
	) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::RefreshToken;

		let span = FlowSpan::new(KIND, "exchange_refresh_token", key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let form = [
					("grant_type", GrantType::RefreshToken.as_str()),
					("refresh_token", refresh_token.expose()),
				];
				let grant = GrantType::RefreshToken;

				self.request_token(key, credentials, grant, &form, Some(refresh_token)).await
			})
			.await;

		record_outcome(KIND, &result);

		result
	}

	async fn request_token(
		&self,
		key: &CredentialKey,
		credentials: &ServiceCredentials,
		grant: GrantType,
		form: &[(&str, &str)],
		prior_refresh: Option<&TokenSecret>,
	) -> Result<TokenRecord> {
		let request = build_request(credentials, form).map_err(|e| Error::config(key, e))?;
		let issued_at = OffsetDateTime::now_utc();
		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|e| self.error_mapper.map_transport_error(key, grant, e))?;

		if !response.status().is_success() {
			return Err(map_error_response(key, grant, &response));
		}

		let status = response.status().as_u16();
		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let body: TokenEndpointResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|e| Error::Upstream {
				key: key.clone(),
				source: UpstreamError::TokenResponseParse {
					source: Arc::new(e),
					status: Some(status),
				},
			})?;

		self.build_record(key, grant, body, issued_at, prior_refresh)
	}

	fn build_record(
		&self,
		key: &CredentialKey,
		grant: GrantType,
		body: TokenEndpointResponse,
		issued_at: OffsetDateTime,
		prior_refresh: Option<&TokenSecret>,
	) -> Result<TokenRecord> {
		let Some(access_token) = body.access_token.filter(|token| !token.trim().is_empty()) else {
			let reason = match (body.error, body.error_description) {
				(Some(error), Some(description)) =>
					format!("response carried no access token ({error}: {description})"),
				(Some(error), None) => format!("response carried no access token ({error})"),
				_ => "response carried no access token".into(),
			};

			return Err(Error::Authentication { key: key.clone(), grant, reason });
		};
		let lifetime = body
			.expires_in
			.as_ref()
			.and_then(ExpiresIn::seconds)
			.filter(|secs| *secs > 0)
			.map(Duration::seconds)
			.unwrap_or(self.default_expires_in);
		let refresh = body
			.refresh_token
			.filter(|token| !token.trim().is_empty())
			.map(TokenSecret::from)
			.or_else(|| prior_refresh.cloned());

		TokenRecord::builder()
			.access_token(access_token)
			.refresh_secret(refresh)
			.issued_at(issued_at)
			.expires_in(lifetime)
			.build()
			.map_err(|e| Error::config(key, e))
	}
}
#[cfg(feature = "reqwest")]
impl TokenClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a reqwest-backed client whose requests time out after `timeout`.
	pub fn reqwest(timeout: Duration) -> Result<Self> {
		Ok(Self::new(ReqwestHttpClient::with_timeout(timeout)?, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for TokenClient<C, M>
where
	C: ?Sized,
	M: ?Sized,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			error_mapper: self.error_mapper.clone(),
			default_expires_in: self.default_expires_in,
		}
	}
}
impl<C, M> Debug for TokenClient<C, M>
where
	C: ?Sized,
	M: ?Sized,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenClient")
			.field("default_expires_in", &self.default_expires_in)
			.finish_non_exhaustive()
	}
}

fn record_outcome<T>(kind: FlowKind, result: &Result<T>) {
	match result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}
}

fn build_request(
	credentials: &ServiceCredentials,
	form: &[(&str, &str)],
) -> Result<HttpRequest, ConfigError> {
	let mut body = FormSerializer::new(String::new());

	body.extend_pairs(form.iter().copied());

	let mut request = Request::builder()
		.method(Method::POST)
		.uri(credentials.token_url.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, JSON_CONTENT_TYPE);

	match credentials.client_auth_method {
		ClientAuthMethod::ClientSecretPost => {
			body.append_pair("client_id", credentials.client_id.as_str());
			body.append_pair("client_secret", credentials.client_secret.secret());
		},
		ClientAuthMethod::ClientSecretBasic => {
			request = request.header(AUTHORIZATION, basic_authorization(credentials));
		},
	}

	Ok(request.body(body.finish().into_bytes())?)
}

// RFC 6749 section 2.3.1: both halves are form-urlencoded before base64.
fn basic_authorization(credentials: &ServiceCredentials) -> String {
	let id = byte_serialize(credentials.client_id.as_bytes()).collect::<String>();
	let secret = byte_serialize(credentials.client_secret.secret().as_bytes()).collect::<String>();

	format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
}

fn map_error_response(key: &CredentialKey, grant: GrantType, response: &HttpResponse) -> Error {
	let status = response.status().as_u16();
	let mut ctx = TokenErrorContext::new(grant).with_http_status(status);

	match serde_json::from_slice::<BasicErrorResponse>(response.body()) {
		Ok(parsed) => {
			ctx = ctx.with_oauth_error(parsed.error().as_ref());

			if let Some(description) = parsed.error_description() {
				ctx = ctx.with_error_description(description.clone());
			}
		},
		Err(_) => ctx = ctx.with_body_preview(String::from_utf8_lossy(response.body())),
	}

	match classify_token_error(&ctx) {
		FailureKind::Authentication =>
			Error::Authentication { key: key.clone(), grant, reason: ctx.reason() },
		FailureKind::Upstream => Error::Upstream {
			key: key.clone(),
			source: UpstreamError::TokenEndpoint {
				message: ctx.reason(),
				status: Some(status),
				retry_after: http::parse_retry_after(response.headers()),
			},
		},
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(key: &CredentialKey, err: ReqwestError) -> Error {
	if err.is_builder() {
		return Error::config(key, err);
	}
	if err.is_timeout() {
		return Error::Upstream {
			key: key.clone(),
			source: UpstreamError::TokenEndpoint {
				message: "Request timed out while calling the token endpoint".into(),
				status: err.status().map(|code| code.as_u16()),
				retry_after: None,
			},
		};
	}

	Error::Transport { key: key.clone(), source: TransportError::from(err) }
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(key: &CredentialKey, message: impl Display) -> Error {
	Error::Upstream {
		key: key.clone(),
		source: UpstreamError::TokenEndpoint {
			message: format!(
				"HTTP client error occurred while calling the token endpoint: {message}"
			),
			status: None,
			retry_after: None,
		},
	}
}
