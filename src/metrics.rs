//! Event sink for exporting circuit breaker activity.

use crate::state::State;

/// Trait for metrics sinks that can receive circuit breaker events.
///
/// Called after the breaker has released its lock.
pub trait MetricSink: Send + Sync + 'static {
    /// Records a state transition event.
    fn record_state_transition(&self, from: State, to: State);

    /// Records whether a half-open probe was admitted.
    fn record_probe_attempt(&self, admitted: bool);

    /// Records a request rejected because the circuit is open or probing is saturated.
    fn record_rejected(&self);

    /// Records a reported call outcome.
    fn record_outcome(&self, success: bool);
}

/// A null metrics sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: State, _to: State) {}
    fn record_probe_attempt(&self, _admitted: bool) {}
    fn record_rejected(&self) {}
    fn record_outcome(&self, _success: bool) {}
}
