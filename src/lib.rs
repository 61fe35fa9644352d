//! Multi-tenant OAuth 2.0 token broker: cached, single-flight, encrypted-at-rest access tokens
//! for every organization and external service an integration talks to.
//!
//! [`flows::TokenManager`] is the public entry point. It resolves an organization/service pair
//! through a [`provider::ServiceDirectory`], serves tokens from the in-memory
//! [`cache::TokenCache`], collapses concurrent refreshes through
//! [`flows::SingleFlight`], and persists every new grant through a
//! [`store::CredentialStore`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
