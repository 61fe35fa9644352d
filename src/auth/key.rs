//! Composite `organization:service` key indexing the cache, the store, and in-flight refreshes.

// self
use crate::{
	_prelude::*,
	auth::{OrganizationId, ServiceType, ValidationError},
};

/// Character joining the organization and service in a rendered [`CredentialKey`].
pub const KEY_SEPARATOR: char = ':';

/// Identifies one credential grant: an organization paired with one of its services.
///
/// Neither identifier may contain [`KEY_SEPARATOR`], so the rendered form is unambiguous and
/// parses back into the same key.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialKey {
	/// Owning organization.
	pub organization: OrganizationId,
	/// External service.
	pub service: ServiceType,
}
impl CredentialKey {
	/// Creates a key from validated identifiers.
	pub fn new(organization: OrganizationId, service: ServiceType) -> Self {
		Self { organization, service }
	}

	/// Validates raw caller input and builds the key.
	pub fn parse(organization: &str, service: &str) -> Result<Self, ValidationError> {
		Ok(Self::new(OrganizationId::new(organization)?, ServiceType::new(service)?))
	}
}
impl Debug for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "CredentialKey({self})")
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}{KEY_SEPARATOR}{}", self.organization, self.service)
	}
}
impl FromStr for CredentialKey {
	type Err = ValidationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (organization, service) = s
			.split_once(KEY_SEPARATOR)
			.ok_or_else(|| ValidationError::MalformedKey { value: s.to_owned() })?;

		Self::parse(organization, service)
	}
}
impl TryFrom<String> for CredentialKey {
	type Error = ValidationError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<CredentialKey> for String {
	fn from(value: CredentialKey) -> Self {
		value.to_string()
	}
}
