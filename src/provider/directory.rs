//! Read-only lookup of OAuth client configuration per organization/service pair.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, OrganizationId, ServiceType},
	provider::{ServiceCredentials, ServiceCredentialsError},
};

/// Resolves an organization/service pair to its OAuth client configuration.
///
/// Implementations must be cheap to call; the manager resolves on every request.
pub trait ServiceDirectory: Send + Sync {
	/// Returns the credentials configured for `key`, or `None` when the pair is unknown.
	fn resolve(&self, key: &CredentialKey) -> Option<ServiceCredentials>;
}

/// Errors raised while loading a [`StaticDirectory`].
#[derive(Debug, ThisError)]
pub enum DirectoryError {
	/// The document is not valid directory JSON.
	#[error("Service directory document is malformed at `{path}`.")]
	Parse {
		/// Path of the offending field.
		path: String,
		/// Underlying JSON failure.
		#[source]
		source: serde_json::Error,
	},
	/// A configured service failed validation.
	#[error("Service `{key}` is misconfigured.")]
	InvalidCredentials {
		/// Offending organization/service pair.
		key: CredentialKey,
		/// Validation failure.
		#[source]
		source: ServiceCredentialsError,
	},
}

/// In-memory directory, typically deserialized from configuration.
///
/// The document shape is `{"organizations": {"<org>": {"<service>": { ...credentials }}}}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StaticDirectory {
	/// Services configured per organization.
	#[serde(default)]
	pub organizations: BTreeMap<OrganizationId, BTreeMap<ServiceType, ServiceCredentials>>,
}
impl StaticDirectory {
	/// Parses and validates a JSON directory document.
	pub fn from_json_str(json: &str) -> Result<Self, DirectoryError> {
		let mut deserializer = serde_json::Deserializer::from_str(json);
		let directory: Self = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			let path = e.path().to_string();

			DirectoryError::Parse { path, source: e.into_inner() }
		})?;

		directory.validate()?;

		Ok(directory)
	}

	/// Registers credentials for `key`, replacing any previous entry.
	pub fn insert(&mut self, key: CredentialKey, credentials: ServiceCredentials) {
		self.organizations.entry(key.organization).or_default().insert(key.service, credentials);
	}

	/// Builder-style variant of [`StaticDirectory::insert`].
	pub fn with_service(mut self, key: CredentialKey, credentials: ServiceCredentials) -> Self {
		self.insert(key, credentials);

		self
	}

	/// Validates every configured service.
	pub fn validate(&self) -> Result<(), DirectoryError> {
		for (organization, services) in &self.organizations {
			for (service, credentials) in services {
				credentials.validate().map_err(|source| DirectoryError::InvalidCredentials {
					key: CredentialKey::new(organization.clone(), service.clone()),
					source,
				})?;
			}
		}

		Ok(())
	}

	/// Every configured pair, in key order.
	pub fn keys(&self) -> Vec<CredentialKey> {
		self.organizations
			.iter()
			.flat_map(|(organization, services)| {
				services
					.keys()
					.map(|service| CredentialKey::new(organization.clone(), service.clone()))
			})
			.collect()
	}
}
impl ServiceDirectory for StaticDirectory {
	fn resolve(&self, key: &CredentialKey) -> Option<ServiceCredentials> {
		self.organizations.get(&key.organization)?.get(&key.service).cloned()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::{ClientAuthMethod, ServiceKind};

	const DOCUMENT: &str = r#"{
		"organizations": {
			"org123": {
				"crm": {
					"client_id": "crm-client",
					"client_secret": "crm-secret",
					"token_url": "https://auth.example.com/oauth/token",
					"scope": "read write"
				},
				"zohocrm": {
					"client_id": "zoho-client",
					"client_secret": "zoho-secret",
					"token_url": "https://accounts.zoho.com/oauth/v2/token",
					"audience": "ZohoCRM.org-1",
					"client_auth_method": "client_secret_basic"
				}
			}
		}
	}"#;

	fn key(organization: &str, service: &str) -> CredentialKey {
		CredentialKey::parse(organization, service).expect("Key fixture should be valid.")
	}

	#[test]
	fn json_document_resolves_configured_pairs() {
		let directory =
			StaticDirectory::from_json_str(DOCUMENT).expect("Directory document should load.");
		let crm = directory.resolve(&key("org123", "crm")).expect("crm should resolve.");
		let zoho = directory.resolve(&key("org123", "zohocrm")).expect("zohocrm should resolve.");

		assert_eq!(crm.scope(), Some("read write"));
		assert_eq!(crm.client_auth_method, ClientAuthMethod::ClientSecretPost);
		assert_eq!(zoho.client_auth_method, ClientAuthMethod::ClientSecretBasic);
		assert_eq!(
			zoho.kind_for(&ServiceType::new("zohocrm").expect("Service should be valid.")),
			ServiceKind::ZohoCrm
		);
		assert!(directory.resolve(&key("org123", "erp")).is_none());
		assert!(directory.resolve(&key("orgX", "crm")).is_none());
		assert_eq!(directory.keys(), vec![key("org123", "crm"), key("org123", "zohocrm")]);
	}

	#[test]
	fn malformed_documents_report_the_failing_path() {
		let err = StaticDirectory::from_json_str(
			r#"{"organizations":{"org 1":{"crm":{"client_id":"a","client_secret":"b","token_url":"https://x.test/t"}}}}"#,
		)
		.expect_err("Whitespace in organization ids must be rejected.");

		assert!(matches!(err, DirectoryError::Parse { .. }));
	}

	#[test]
	fn invalid_credentials_name_the_pair() {
		let err = StaticDirectory::from_json_str(
			r#"{"organizations":{"org1":{"crm":{"client_id":"","client_secret":"b","token_url":"https://x.test/t"}}}}"#,
		)
		.expect_err("Empty client ids must be rejected.");

		match err {
			DirectoryError::InvalidCredentials { key: failing, source } => {
				assert_eq!(failing, key("org1", "crm"));
				assert_eq!(source, ServiceCredentialsError::MissingClientId);
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
