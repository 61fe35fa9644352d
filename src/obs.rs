//! Optional observability helpers for broker flows and store diagnostics.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit structured spans named `token_broker.flow` with
//!   the `flow`, `stage`, and `key` fields, plus warning events for store recovery and refresh
//!   fallbacks.
//! - Enable `metrics` to increment the `token_broker_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `token_broker_store_event_total` counter labeled by `event`.
//!
//! Token and client secrets never reach either sink.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, auth::CredentialKey};

/// Flow kinds observed by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// `get_valid_token` acquisition, from cache lookup to persisted grant.
	Acquire,
	/// Client Credentials grant.
	ClientCredentials,
	/// Refresh Token grant.
	RefreshToken,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Acquire => "acquire",
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::RefreshToken => "refresh_token",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a broker helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Recoverable store conditions that are reported instead of surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreEvent {
	/// The whole store document was not valid JSON and was reset.
	CorruptDocument,
	/// Resetting a corrupt document failed; the next save retries.
	ResetFailed,
	/// One entry could not be decrypted or deserialized.
	UndecryptableEntry,
	/// The store document could not be read.
	ReadFailed,
	/// A persisted key is not a valid `organization:service` pair.
	InvalidKey,
}
impl StoreEvent {
	/// Returns a stable label suitable for event or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StoreEvent::CorruptDocument => "corrupt_document",
			StoreEvent::ResetFailed => "reset_failed",
			StoreEvent::UndecryptableEntry => "undecryptable_entry",
			StoreEvent::ReadFailed => "read_failed",
			StoreEvent::InvalidKey => "invalid_key",
		}
	}
}
impl Display for StoreEvent {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reports a recovered store condition to every enabled sink.
pub fn record_store_event(event: StoreEvent, key: Option<&CredentialKey>, detail: &dyn Display) {
	emit_store_event(event, key, detail);
	count_store_event(event);
}
