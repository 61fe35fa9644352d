//! Storage contracts and built-in store implementations for token records.

pub mod cipher;
pub mod file;
pub mod memory;

pub use cipher::{Aes256GcmCipher, Cipher, CipherError};
pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
};

/// Boxed future returned by [`CredentialStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Durable, keyed persistence of token records.
///
/// Reads never fail: unreadable or corrupt data is reported as absent. Writes surface their
/// failures so callers never cache a record that was not persisted.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record for `key`.
	fn save<'a>(&'a self, key: &'a CredentialKey, record: TokenRecord) -> StoreFuture<'a, ()>;

	/// Fetches the record for `key`, if present and readable.
	fn load<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Removes the record for `key`, returning whether anything was removed.
	fn delete<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, bool>;

	/// Lists every persisted key.
	fn keys(&self) -> StoreFuture<'_, Vec<CredentialKey>>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// The record cannot be persisted as-is (e.g., empty access token).
	#[error("Invalid record: {message}.")]
	InvalidRecord {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Encryption failures surfaced by the configured cipher.
	#[error("Encryption error: {message}.")]
	Encryption {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

pub(crate) fn ensure_persistable(record: &TokenRecord) -> Result<(), StoreError> {
	if record.access_token.is_blank() {
		return Err(StoreError::InvalidRecord { message: "access token is empty".into() });
	}

	Ok(())
}
