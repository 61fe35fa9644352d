//! Thread-safe in-memory [`CredentialStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	store::{CredentialStore, StoreError, StoreFuture, ensure_persistable},
};

type StoreMap = Arc<RwLock<BTreeMap<CredentialKey, TokenRecord>>>;

/// Thread-safe storage backend that keeps records in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Number of stored records.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, key: CredentialKey, record: TokenRecord) -> Result<(), StoreError> {
		ensure_persistable(&record)?;

		map.write().insert(key, record);

		Ok(())
	}
}
impl CredentialStore for MemoryStore {
	fn save<'a>(&'a self, key: &'a CredentialKey, record: TokenRecord) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move { Self::save_now(map, key, record) })
	}

	fn load<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<TokenRecord>> {
		let record = self.0.read().get(key).cloned();

		Box::pin(async move { Ok(record) })
	}

	fn delete<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, bool> {
		let removed = self.0.write().remove(key).is_some();

		Box::pin(async move { Ok(removed) })
	}

	fn keys(&self) -> StoreFuture<'_, Vec<CredentialKey>> {
		let keys = self.0.read().keys().cloned().collect();

		Box::pin(async move { Ok(keys) })
	}
}
