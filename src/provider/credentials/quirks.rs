// self
use crate::{_prelude::*, auth::ServiceType};

/// Closed set of provider families whose token requests deviate from RFC 6749.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
	/// Plain RFC 6749 token endpoint.
	#[default]
	Standard,
	/// Zoho CRM, which expects the audience as `soid`.
	ZohoCrm,
}
impl ServiceKind {
	/// Infers the quirk set from a service-type tag.
	pub fn for_service(service: &ServiceType) -> Self {
		let tag = service.to_ascii_lowercase();

		match tag.as_str() {
			"zohocrm" | "zoho" | "zoho_crm" | "zoho-crm" => Self::ZohoCrm,
			_ => Self::Standard,
		}
	}

	/// Form parameter that carries the configured audience.
	pub fn audience_param(self) -> &'static str {
		match self {
			Self::Standard => "audience",
			Self::ZohoCrm => "soid",
		}
	}
}
