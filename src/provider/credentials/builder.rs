// crates.io
use oauth2::{ClientId, ClientSecret};
// self
use crate::{
	_prelude::*,
	provider::{ClientAuthMethod, ServiceCredentials, ServiceKind},
};

/// Errors raised while constructing or validating service credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ServiceCredentialsError {
	/// Client identifier is empty.
	#[error("Client identifier cannot be empty.")]
	MissingClientId,
	/// Client secret is empty.
	#[error("Client secret cannot be empty.")]
	MissingClientSecret,
	/// Token endpoint must use HTTPS (loopback hosts excepted).
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureTokenEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ServiceCredentials`] values.
#[derive(Debug)]
pub struct ServiceCredentialsBuilder {
	client_id: String,
	client_secret: String,
	token_url: Url,
	scope: Option<String>,
	audience: Option<String>,
	kind: Option<ServiceKind>,
	client_auth_method: ClientAuthMethod,
}
impl ServiceCredentialsBuilder {
	/// Creates a new builder seeded with the mandatory fields.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		token_url: Url,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			token_url,
			scope: None,
			audience: None,
			kind: None,
			client_auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the `scope` sent with client-credentials requests.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Sets the audience sent with client-credentials requests.
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Pins the quirk set instead of inferring it from the service type.
	pub fn kind(mut self, kind: ServiceKind) -> Self {
		self.kind = Some(kind);

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Consumes the builder and validates the resulting credentials.
	pub fn build(self) -> Result<ServiceCredentials, ServiceCredentialsError> {
		let credentials = ServiceCredentials {
			client_id: ClientId::new(self.client_id),
			client_secret: ClientSecret::new(self.client_secret),
			token_url: self.token_url,
			scope: self.scope,
			audience: self.audience,
			kind: self.kind,
			client_auth_method: self.client_auth_method,
		};

		credentials.validate()?;

		Ok(credentials)
	}
}

pub(crate) fn validate_token_url(url: &Url) -> Result<(), ServiceCredentialsError> {
	if url.scheme() == "https" || is_loopback(url) {
		return Ok(());
	}

	Err(ServiceCredentialsError::InsecureTokenEndpoint { url: url.to_string() })
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
