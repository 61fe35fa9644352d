//! OAuth client configuration resolved for one organization/service pair.
//!
//! The module exposes validated credential data, its builder, the grant identifiers used on
//! the wire, and the per-service quirk table, all independent of any HTTP client.

/// Builder API for assembling service credentials.
pub mod builder;
/// Grant identifiers sent to token endpoints.
pub mod grant;
/// Service-specific request quirks.
pub mod quirks;

pub use builder::*;
pub use grant::*;
pub use quirks::*;

// crates.io
use oauth2::{ClientId, ClientSecret};
// self
use crate::{_prelude::*, auth::ServiceType};

/// How the client authenticates against the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Form POST body parameters for `client_id`/`client_secret`.
	#[default]
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
}

/// Client credentials and token endpoint for one external service.
///
/// The secret is wrapped in [`ClientSecret`], whose `Debug` output is redacted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceCredentials {
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// OAuth client secret.
	pub client_secret: ClientSecret,
	/// Token endpoint used for both grants.
	pub token_url: Url,
	/// Optional `scope` sent with the client-credentials grant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Optional audience sent with the client-credentials grant.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audience: Option<String>,
	/// Explicit quirk selection; inferred from the service type when absent.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<ServiceKind>,
	/// Client authentication method for token requests.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
}
impl ServiceCredentials {
	/// Creates a builder seeded with the mandatory fields.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		token_url: Url,
	) -> ServiceCredentialsBuilder {
		ServiceCredentialsBuilder::new(client_id, client_secret, token_url)
	}

	/// Quirk set applied when talking to `service`.
	pub fn kind_for(&self, service: &ServiceType) -> ServiceKind {
		self.kind.unwrap_or_else(|| ServiceKind::for_service(service))
	}

	/// Non-blank scope, if configured.
	pub fn scope(&self) -> Option<&str> {
		non_blank(self.scope.as_deref())
	}

	/// Non-blank audience, if configured.
	pub fn audience(&self) -> Option<&str> {
		non_blank(self.audience.as_deref())
	}

	/// Validates values that may have bypassed the builder (e.g., deserialized configuration).
	pub fn validate(&self) -> Result<(), ServiceCredentialsError> {
		if self.client_id.as_str().trim().is_empty() {
			return Err(ServiceCredentialsError::MissingClientId);
		}
		if self.client_secret.secret().trim().is_empty() {
			return Err(ServiceCredentialsError::MissingClientSecret);
		}

		validate_token_url(&self.token_url)
	}
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}
