// self
use crate::{
	_prelude::*,
	auth::CredentialKey,
	obs::{FlowKind, StoreEvent},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the flow kind, the stage, and the credential key.
	pub fn new(kind: FlowKind, stage: &'static str, key: &CredentialKey) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"token_broker.flow",
				flow = kind.as_str(),
				stage,
				key = %key
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage, key);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a recovered store condition.
pub fn emit_store_event(event: StoreEvent, key: Option<&CredentialKey>, detail: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		match key {
			Some(key) => tracing::warn!(event = event.as_str(), key = %key, "{detail}"),
			None => tracing::warn!(event = event.as_str(), "{detail}"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (event, key, detail);
	}
}

/// Logs a failed refresh grant that falls back to client credentials.
pub fn record_refresh_fallback(key: &CredentialKey, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			key = %key,
			error = %error,
			"Refresh grant failed; falling back to client credentials."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (key, error);
	}
}

/// Logs how many persisted records were loaded into the cache.
pub fn record_cache_warmed(loaded: usize, skipped: usize) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(loaded, skipped, "Token cache warmed from the credential store.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (loaded, skipped);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::key;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let key = key("org", "crm");
		let span = FlowSpan::new(FlowKind::RefreshToken, "instrument_wraps_future", &key);
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn events_accept_missing_keys() {
		emit_store_event(StoreEvent::CorruptDocument, None, &"reset");
		record_cache_warmed(0, 0);
	}
}
