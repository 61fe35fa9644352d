//! Service-facing configuration (data) and error classification (behavior).
//!
//! `credentials` exposes validated per-service client configuration (`ServiceCredentials`)
//! covering token endpoints, client authentication, scope/audience, and provider quirks.
//! `directory` resolves organization/service pairs to those credentials, and `strategy`
//! maps failed token requests into the broker error taxonomy.

pub mod credentials;
pub mod directory;
pub mod strategy;

pub use credentials::*;
pub use directory::*;
pub use strategy::*;
