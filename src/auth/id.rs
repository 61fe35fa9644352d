//! Organization and service identifiers, validated at construction.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::{_prelude::*, auth::KEY_SEPARATOR};

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = ValidationError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = ValidationError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when an organization, service, or credential key fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum ValidationError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (organization, service).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (organization, service).
		kind: &'static str,
	},
	/// The identifier contains the credential key separator.
	#[error("{kind} identifier cannot contain `{separator}`.")]
	ContainsSeparator {
		/// Kind of identifier (organization, service).
		kind: &'static str,
		/// Reserved separator character.
		separator: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (organization, service).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// A rendered credential key could not be split into its two identifiers.
	#[error("Credential key `{value}` is not of the form `organization:service`.")]
	MalformedKey {
		/// Offending input.
		value: String,
	},
}

def_id! { OrganizationId, "Identifier of a tenant organization.", "Organization" }
def_id! {
	ServiceType,
	"Identifier of an external service configured for an organization.",
	"Service"
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), ValidationError> {
	if view.is_empty() {
		return Err(ValidationError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(ValidationError::ContainsWhitespace { kind });
	}
	if view.contains(KEY_SEPARATOR) {
		return Err(ValidationError::ContainsSeparator { kind, separator: KEY_SEPARATOR });
	}
	if view.chars().count() > IDENTIFIER_MAX_LEN {
		return Err(ValidationError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
