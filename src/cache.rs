//! In-memory token cache with per-entry TTL deadlines.
//!
//! Entries expire lazily: reads drop dead entries, and [`TokenCache::purge_expired`] is the hook
//! for periodic sweeps. Locks are never held across `.await`.

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
};

/// TTL applied when a caller supplies a non-positive one.
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::hours(1);

/// A cached record together with its own eviction deadline.
#[derive(Clone, Debug)]
pub struct CacheEntry {
	/// Cached token record.
	pub record: TokenRecord,
	/// Instant after which the entry is treated as absent.
	pub deadline: OffsetDateTime,
}
impl CacheEntry {
	/// Returns `true` while `instant` is before the deadline.
	pub fn is_live_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.deadline
	}

	/// Remaining TTL at `instant`, clamped at zero.
	pub fn ttl_at(&self, instant: OffsetDateTime) -> Duration {
		(self.deadline - instant).max(Duration::ZERO)
	}
}

/// Concurrent map from credential key to cached record.
#[derive(Debug)]
pub struct TokenCache {
	entries: RwLock<HashMap<CredentialKey, CacheEntry>>,
	fallback_ttl: Duration,
}
impl TokenCache {
	/// Creates an empty cache with the given fallback TTL.
	pub fn new(fallback_ttl: Duration) -> Self {
		let fallback_ttl =
			if fallback_ttl.is_positive() { fallback_ttl } else { DEFAULT_FALLBACK_TTL };

		Self { entries: RwLock::new(HashMap::new()), fallback_ttl }
	}

	/// Returns the live record for `key`, if any.
	pub fn get(&self, key: &CredentialKey) -> Option<TokenRecord> {
		self.get_at(key, OffsetDateTime::now_utc())
	}

	/// Same as [`TokenCache::get`] against an explicit clock.
	pub fn get_at(&self, key: &CredentialKey, now: OffsetDateTime) -> Option<TokenRecord> {
		self.entry_at(key, now).map(|entry| entry.record)
	}

	/// Returns the live entry (record plus deadline) for `key`, if any.
	pub fn entry_at(&self, key: &CredentialKey, now: OffsetDateTime) -> Option<CacheEntry> {
		{
			let entries = self.entries.read();

			match entries.get(key) {
				Some(entry) if entry.is_live_at(now) => return Some(entry.clone()),
				Some(_) => {},
				None => return None,
			}
		}

		let mut entries = self.entries.write();

		// Another writer may have replaced the entry between the two locks.
		match entries.get(key) {
			Some(entry) if entry.is_live_at(now) => Some(entry.clone()),
			Some(_) => {
				entries.remove(key);

				None
			},
			None => None,
		}
	}

	/// Inserts or replaces the record for `key`.
	///
	/// A non-positive `ttl` is replaced by the fallback TTL.
	pub fn set(&self, key: CredentialKey, record: TokenRecord, ttl: Duration) {
		self.set_at(key, record, ttl, OffsetDateTime::now_utc());
	}

	/// Same as [`TokenCache::set`] against an explicit clock.
	pub fn set_at(
		&self,
		key: CredentialKey,
		record: TokenRecord,
		ttl: Duration,
		now: OffsetDateTime,
	) {
		let ttl = if ttl.is_positive() { ttl } else { self.fallback_ttl };

		self.entries.write().insert(key, CacheEntry { record, deadline: now + ttl });
	}

	/// Removes the entry for `key`, returning whether one existed.
	pub fn delete(&self, key: &CredentialKey) -> bool {
		self.entries.write().remove(key).is_some()
	}

	/// Live keys with their remaining TTL.
	pub fn live_entries_at(&self, now: OffsetDateTime) -> Vec<(CredentialKey, Duration)> {
		self.entries
			.read()
			.iter()
			.filter(|(_, entry)| entry.is_live_at(now))
			.map(|(key, entry)| (key.clone(), entry.ttl_at(now)))
			.collect()
	}

	/// Every live key.
	pub fn keys(&self) -> Vec<CredentialKey> {
		self.live_entries_at(OffsetDateTime::now_utc()).into_iter().map(|(key, _)| key).collect()
	}

	/// Evicts every dead entry and returns how many were removed.
	pub fn purge_expired(&self) -> usize {
		self.purge_expired_at(OffsetDateTime::now_utc())
	}

	/// Same as [`TokenCache::purge_expired`] against an explicit clock.
	pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|_, entry| entry.is_live_at(now));

		before - entries.len()
	}

	/// Number of stored entries, live or not yet purged.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}
}
impl Default for TokenCache {
	fn default() -> Self {
		Self::new(DEFAULT_FALLBACK_TTL)
	}
}
