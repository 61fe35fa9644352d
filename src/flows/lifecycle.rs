//! Public token lifecycle operations of [`TokenManager`].

// self
use crate::{
	_prelude::*,
	auth::{CredentialKey, TokenRecord},
	flows::TokenManager,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, StoreEvent},
	provider::ServiceCredentials,
};

/// Liveness of one cached credential key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
	/// `true` while the cached access token has not expired.
	pub active: bool,
	/// Remaining validity in whole seconds.
	pub ttl: u64,
}

impl<C, M> TokenManager<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns an access token for the pair that stays valid beyond the expiry margin.
	///
	/// Cached tokens are served without any upstream call. Otherwise one grant per key is
	/// obtained, persisted, and cached while concurrent callers for the same key share its
	/// outcome. A record that cannot be persisted is neither cached nor returned.
	pub async fn get_valid_token(&self, organization: &str, service: &str) -> Result<String> {
		const KIND: FlowKind = FlowKind::Acquire;

		let key = CredentialKey::parse(organization, service)?;
		let credentials = self.resolve(&key)?;
		let span = FlowSpan::new(KIND, "get_valid_token", &key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				if let Some(record) = self.usable_cached(&key, OffsetDateTime::now_utc()) {
					return Ok(record);
				}

				self.inflight.run(&key, || self.obtain(&key, &credentials)).await
			})
			.await;

		match result {
			Ok(record) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(record.access_token.expose().to_owned())
			},
			Err(e) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(e)
			},
		}
	}

	/// Remaining validity of the cached token in whole seconds.
	///
	/// Returns `0` for absent entries and malformed identifiers.
	pub fn get_token_ttl(&self, organization: &str, service: &str) -> u64 {
		let Ok(key) = CredentialKey::parse(organization, service) else {
			return 0;
		};
		let now = OffsetDateTime::now_utc();

		self.cache
			.get_at(&key, now)
			.map(|record| whole_seconds(record.remaining_at(now)))
			.unwrap_or(0)
	}

	/// Drops the pair's token from the cache and the store.
	///
	/// Returns whether anything was removed, so a repeated call yields `false`.
	pub async fn revoke_tokens(&self, organization: &str, service: &str) -> Result<bool> {
		let key = CredentialKey::parse(organization, service)?;

		self.resolve(&key)?;

		let cached = self.cache.delete(&key);
		let stored = self.store.delete(&key).await.map_err(|e| Error::storage(&key, e))?;

		Ok(cached || stored)
	}

	/// Reports every cached key, keyed by its `organization:service` form.
	///
	/// Only what the cache holds is reported; see [`TokenManager::warm_from_store`] for
	/// repopulating it after a restart.
	pub fn get_service_statuses(&self) -> BTreeMap<String, ServiceStatus> {
		let now = OffsetDateTime::now_utc();

		self.cache.purge_expired_at(now);

		self.cache
			.keys()
			.into_iter()
			.filter_map(|key| {
				let record = self.cache.get_at(&key, now)?;
				let status = ServiceStatus {
					active: !record.is_expired_at(now),
					ttl: whole_seconds(record.remaining_at(now)),
				};

				Some((key.to_string(), status))
			})
			.collect()
	}

	/// Loads every persisted, unexpired record whose pair still resolves into the cache.
	///
	/// Returns the number of records loaded. Keys already cached are left untouched.
	pub async fn warm_from_store(&self) -> Result<usize> {
		let now = OffsetDateTime::now_utc();
		let mut loaded = 0;
		let mut skipped = 0;

		for key in self.store.keys().await? {
			if self.directory.resolve(&key).is_none() || self.cache.get_at(&key, now).is_some() {
				skipped += 1;

				continue;
			}

			match self.store.load(&key).await {
				Ok(Some(record)) if !record.is_expired_at(now) => {
					let ttl = record.remaining_at(now);

					self.cache.set_at(key, record, ttl, now);

					loaded += 1;
				},
				Ok(_) => skipped += 1,
				Err(e) => {
					obs::record_store_event(StoreEvent::ReadFailed, Some(&key), &e);

					skipped += 1;
				},
			}
		}

		obs::record_cache_warmed(loaded, skipped);

		Ok(loaded)
	}

	fn resolve(&self, key: &CredentialKey) -> Result<ServiceCredentials> {
		self.directory.resolve(key).ok_or_else(|| Error::NotFound { key: key.clone() })
	}

	fn usable_cached(&self, key: &CredentialKey, now: OffsetDateTime) -> Option<TokenRecord> {
		self.cache.get_at(key, now).filter(|record| self.is_usable(record, now))
	}

	fn is_usable(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		record.is_usable_at(now, self.config.expiry_margin)
	}

	async fn best_known(&self, key: &CredentialKey, now: OffsetDateTime) -> Option<TokenRecord> {
		if let Some(record) = self.cache.get_at(key, now) {
			return Some(record);
		}

		match self.store.load(key).await {
			Ok(record) => record,
			Err(e) => {
				obs::record_store_event(StoreEvent::ReadFailed, Some(key), &e);

				None
			},
		}
	}

	/// Runs inside the single-flight ticket for `key`.
	async fn obtain(
		&self,
		key: &CredentialKey,
		credentials: &ServiceCredentials,
	) -> Result<TokenRecord> {
		let now = OffsetDateTime::now_utc();

		// A flight that finished just before this one registered may have cached a token.
		if let Some(record) = self.usable_cached(key, now) {
			return Ok(record);
		}

		let existing = self.best_known(key, now).await;

		if let Some(record) = existing.as_ref().filter(|record| self.is_usable(record, now)) {
			self.cache.set_at(key.clone(), record.clone(), record.remaining_at(now), now);

			return Ok(record.clone());
		}

		self.refresh_metrics.record_attempt();

		let record = match self.client.refresh(key, credentials, existing.as_ref()).await {
			Ok(record) => record,
			Err(e) => {
				self.refresh_metrics.record_failure();

				return Err(e);
			},
		};

		if let Err(e) = self.store.save(key, record.clone()).await {
			self.refresh_metrics.record_failure();

			return Err(Error::storage(key, e));
		}

		let now = OffsetDateTime::now_utc();

		self.cache.set_at(key.clone(), record.clone(), record.remaining_at(now), now);
		self.refresh_metrics.record_success();

		Ok(record)
	}
}

fn whole_seconds(duration: Duration) -> u64 {
	u64::try_from(duration.whole_seconds()).unwrap_or(0)
}
