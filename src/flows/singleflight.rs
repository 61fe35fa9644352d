//! Per-key coalescing of concurrent asynchronous operations.
//!
//! The first caller for a key becomes the leader and runs its operation; callers arriving while
//! it is in flight await the leader's result instead of starting their own. The registration is
//! dropped before the result is published, so a request that arrives after completion always
//! starts fresh. If the leader is cancelled, one of the waiting callers takes over with its own
//! operation.

// crates.io
use async_lock::OnceCell;
// self
use crate::_prelude::*;

type Ticket<T> = Arc<OnceCell<Result<T>>>;

/// Registry of in-flight operations keyed by `K`, each resolving to a shared `Result<T>`.
pub struct SingleFlight<K, T> {
	inflight: Mutex<HashMap<K, Ticket<T>>>,
}
impl<K, T> SingleFlight<K, T>
where
	K: Clone + Eq + Hash,
	T: Clone,
{
	/// Runs `operation` for `key` unless one is already in flight, in which case its outcome is
	/// shared.
	pub async fn run<F, Fut>(&self, key: &K, operation: F) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let ticket = self
			.inflight
			.lock()
			.entry(key.clone())
			.or_insert_with(|| Arc::new(OnceCell::new()))
			.clone();
		let registered = &ticket;

		ticket
			.get_or_init(|| async move {
				let result = operation().await;

				self.release(key, registered);

				result
			})
			.await
			.clone()
	}

	/// Returns `true` while an operation for `key` is registered.
	pub fn in_flight(&self, key: &K) -> bool {
		self.inflight.lock().contains_key(key)
	}

	/// Number of registered keys.
	pub fn len(&self) -> usize {
		self.inflight.lock().len()
	}

	/// Returns `true` when nothing is in flight.
	pub fn is_empty(&self) -> bool {
		self.inflight.lock().is_empty()
	}

	fn release(&self, key: &K, ticket: &Ticket<T>) {
		let mut inflight = self.inflight.lock();

		// Only drop our own registration; a newer flight may already own the slot.
		if inflight.get(key).is_some_and(|current| Arc::ptr_eq(current, ticket)) {
			inflight.remove(key);
		}
	}
}
impl<K, T> Default for SingleFlight<K, T> {
	fn default() -> Self {
		Self { inflight: Mutex::new(HashMap::new()) }
	}
}
impl<K, T> Debug for SingleFlight<K, T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SingleFlight").field("in_flight", &self.inflight.lock().len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{_preludet::key, error::ConfigError};

	#[tokio::test]
	async fn concurrent_callers_share_one_operation() {
		let flights = SingleFlight::<&str, u32>::default();
		let runs = &AtomicUsize::new(0);
		let operation = move || async move {
			runs.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;

			Ok(7)
		};
		let (first, second, third) = tokio::join!(
			flights.run(&"org:crm", operation),
			flights.run(&"org:crm", operation),
			flights.run(&"org:crm", operation),
		);

		assert_eq!(runs.load(Ordering::SeqCst), 1);
		assert_eq!(first.expect("Leader should succeed."), 7);
		assert_eq!(second.expect("Waiter should share the result."), 7);
		assert_eq!(third.expect("Waiter should share the result."), 7);
		assert!(flights.is_empty(), "Registration should be cleared after completion.");
	}

	#[tokio::test]
	async fn distinct_keys_run_independently() {
		let flights = SingleFlight::<&str, u32>::default();
		let runs = &AtomicUsize::new(0);
		let operation = move || async move {
			runs.fetch_add(1, Ordering::SeqCst);
			tokio::task::yield_now().await;

			Ok(1)
		};
		let (a, b) =
			tokio::join!(flights.run(&"org:crm", operation), flights.run(&"org:erp", operation));

		assert!(a.is_ok() && b.is_ok());
		assert_eq!(runs.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn failures_are_shared_and_not_retained() {
		let flights = SingleFlight::<&str, u32>::default();
		let failing = || async {
			tokio::task::yield_now().await;

			Err(Error::from(ConfigError::InvalidSetting { name: "flight", reason: "boom".into() }))
		};
		let (first, second) =
			tokio::join!(flights.run(&"org:crm", failing), flights.run(&"org:crm", failing));

		assert!(matches!(first, Err(Error::Config { key: None, .. })));
		assert!(matches!(second, Err(Error::Config { key: None, .. })));

		let retried = flights.run(&"org:crm", || async { Ok(3) }).await;

		assert_eq!(retried.expect("A later call should start a fresh operation."), 3);
	}

	#[tokio::test]
	async fn completed_results_are_not_memoized() {
		let flights = SingleFlight::<&str, u32>::default();

		assert_eq!(flights.run(&"k", || async { Ok(1) }).await.expect("First run."), 1);
		assert_eq!(flights.run(&"k", || async { Ok(2) }).await.expect("Second run."), 2);
	}

	#[tokio::test]
	async fn cancelled_leader_does_not_wedge_the_key() {
		let flights = SingleFlight::<_, u32>::default();
		let key = key("org", "crm");

		{
			let leader = flights.run(&key, || std::future::pending::<Result<u32>>());

			tokio::select! {
				biased;
				_ = leader => unreachable!("Pending operation cannot finish."),
				_ = tokio::task::yield_now() => {},
			}
		}

		let next = flights.run(&key, || async { Ok(9) }).await;

		assert_eq!(next.expect("A later caller should take over the abandoned flight."), 9);
		assert!(!flights.in_flight(&key));
	}
}
