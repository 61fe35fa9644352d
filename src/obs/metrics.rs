// self
use crate::obs::{FlowKind, FlowOutcome, StoreEvent};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"token_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts a recovered store condition via the global metrics recorder (when enabled).
pub fn count_store_event(event: StoreEvent) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("token_broker_store_event_total", "event" => event.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = event;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_never_panic_without_an_installed_recorder() {
		record_flow_outcome(FlowKind::ClientCredentials, FlowOutcome::Failure);
		count_store_event(StoreEvent::CorruptDocument);
	}
}
