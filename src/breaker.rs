//! Core circuit breaker implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{BreakerBuilder, CircuitBreakerConfig};
use crate::error::{codes, ErrorInfo};
use crate::hook::HookRegistry;
use crate::metrics::MetricSink;
use crate::result::Result;
use crate::state::{State, StateMachine, Transition};
use crate::stats::{Stats, StatsMap};

/// Inner state of the circuit breaker, shared between clones.
struct BreakerInner {
    machine: Mutex<StateMachine>,
    name: String,
    metric_sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// A thread-safe circuit breaker guarding a single dependency.
///
/// Callers ask [`allow_request`](Self::allow_request) before issuing a
/// protected call and report its outcome with
/// [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure). All state lives behind one lock,
/// so every transition is atomic with respect to concurrent callers.
/// Cloning is cheap and the clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Creates a circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Creates a new builder for customizing a circuit breaker.
    pub fn builder() -> BreakerBuilder {
        BreakerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: CircuitBreakerConfig,
        name: String,
        metric_sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = BreakerInner {
            machine: Mutex::new(StateMachine::new(config, Instant::now())),
            name,
            metric_sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// The configuration in effect.
    pub fn config(&self) -> CircuitBreakerConfig {
        *self.inner.machine.lock().config()
    }

    /// Gets the current state of the circuit breaker.
    pub fn state(&self) -> State {
        self.inner.machine.lock().state()
    }

    /// Time since the last state transition.
    pub fn time_in_state(&self) -> Duration {
        self.inner.machine.lock().time_in_state(Instant::now())
    }

    /// Number of failures currently counted toward the threshold.
    pub fn failure_count(&self) -> usize {
        self.inner.machine.lock().failure_count(Instant::now())
    }

    /// Returns whether a request may proceed.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open on this
    /// call and admits it as the first probe.
    pub fn allow_request(&self) -> bool {
        let (admission, probing) = {
            let mut machine = self.inner.machine.lock();
            let admission = machine.allow_request(Instant::now());
            (admission, machine.state() == State::HalfOpen)
        };

        if let Some(transition) = admission.transition {
            self.emit(transition);
        }
        if probing {
            self.inner.metric_sink.record_probe_attempt(admission.allowed);
        }
        if !admission.allowed {
            self.inner.metric_sink.record_rejected();
            self.inner.hooks.execute_rejected_hook();
        }

        admission.allowed
    }

    /// Reports a successful protected call.
    pub fn record_success(&self) {
        let transition = self.inner.machine.lock().record_success(Instant::now());

        self.inner.metric_sink.record_outcome(true);
        self.inner.hooks.execute_success_hook();
        if let Some(transition) = transition {
            self.emit(transition);
        }
    }

    /// Reports a failed protected call.
    pub fn record_failure(&self) {
        let transition = self.inner.machine.lock().record_failure(Instant::now());

        self.inner.metric_sink.record_outcome(false);
        self.inner.hooks.execute_failure_hook();
        if let Some(transition) = transition {
            self.emit(transition);
        }
    }

    /// Returns a guard that records a failure when dropped, unless
    /// [`BreakerGuard::record_success`] was called first.
    pub fn guard(&self) -> BreakerGuard<'_> {
        BreakerGuard {
            breaker: self,
            committed: false,
        }
    }

    /// Runs `f` if the circuit allows it and records the outcome.
    ///
    /// A rejected call returns [`codes::CIRCUIT_OPEN`] without running `f`.
    /// A panic inside `f` is recorded as a failure before it propagates.
    pub fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if !self.allow_request() {
            return Err(self.open_error());
        }

        let guard = self.guard();
        let result = f();
        if result.is_ok() {
            guard.record_success();
        }
        result
    }

    /// Executes an async function wrapped by the circuit breaker.
    pub async fn call_async<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.allow_request() {
            return Err(self.open_error());
        }

        let guard = self.guard();
        let result = f().await;
        if result.is_ok() {
            guard.record_success();
        }
        result
    }

    /// Forces the circuit breaker to the open state.
    ///
    /// Returns `false` if it was already open.
    pub fn force_open(&self) -> bool {
        self.force(State::Open)
    }

    /// Forces the circuit breaker to the closed state, clearing its counters.
    ///
    /// Returns `false` if it was already closed.
    pub fn force_closed(&self) -> bool {
        self.force(State::Closed)
    }

    fn force(&self, to: State) -> bool {
        let transition = self.inner.machine.lock().force(to, Instant::now());
        match transition {
            Some(transition) => {
                self.emit(transition);
                true
            }
            None => false,
        }
    }

    fn emit(&self, transition: Transition) {
        debug!(
            breaker = %self.inner.name,
            from = %transition.from,
            to = %transition.to,
            "circuit breaker state transition"
        );
        self.inner
            .metric_sink
            .record_state_transition(transition.from, transition.to);
        self.inner.hooks.execute_transition_hooks(transition);
    }

    fn open_error(&self) -> ErrorInfo {
        ErrorInfo::new(codes::CIRCUIT_OPEN, "Circuit breaker is open")
            .with_module(codes::BREAKER_MODULE)
            .with_details(self.inner.name.clone())
    }
}

impl Stats for CircuitBreaker {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn get_stats(&self) -> StatsMap {
        let machine = self.inner.machine.lock();
        let state = machine.state();

        let mut stats = StatsMap::new();
        stats.insert("current_state".into(), state.as_str().into());
        stats.insert(
            "failure_count".into(),
            machine.failure_count(Instant::now()).into(),
        );
        stats.insert(
            "consecutive_successes".into(),
            machine.consecutive_successes().into(),
        );
        stats.insert(
            "half_open_requests".into(),
            machine.half_open_requests().into(),
        );
        stats.insert(
            "failure_threshold".into(),
            machine.config().failure_threshold.into(),
        );
        stats.insert("is_open".into(), (state == State::Open).into());
        stats
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Records the outcome of one protected call; see [`CircuitBreaker::guard`].
#[must_use = "dropping the guard immediately records a failure"]
pub struct BreakerGuard<'a> {
    breaker: &'a CircuitBreaker,
    committed: bool,
}

impl BreakerGuard<'_> {
    /// Marks the call as successful.
    pub fn record_success(mut self) {
        self.committed = true;
        self.breaker.record_success();
    }
}

impl Drop for BreakerGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.breaker.record_failure();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker(failure_threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::builder()
            .failure_threshold(failure_threshold)
            .success_threshold(2)
            .half_open_max_requests(3)
            .timeout(timeout)
            .build()
    }

    #[test]
    fn two_failures_open_the_circuit() {
        let breaker = breaker(2, Duration::from_secs(60));
        breaker.record_failure();
        breaker.record_failure();

        let stats = breaker.get_stats();
        assert_eq!(breaker.state(), State::Open);
        assert_eq!(stats["failure_count"].as_int(), Some(2));
        assert_eq!(stats["is_open"].as_bool(), Some(true));
        assert_eq!(stats["current_state"].as_str(), Some("OPEN"));
        assert!(!breaker.allow_request());
    }

    #[test]
    fn zero_timeout_probes_immediately() {
        let breaker = breaker(1, Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), State::Open);
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), State::HalfOpen);
    }

    #[test]
    fn guard_records_failure_when_dropped() {
        let breaker = breaker(1, Duration::from_secs(60));
        {
            let _guard = breaker.guard();
        }
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn guard_success_is_recorded_once() {
        let breaker = breaker(1, Duration::ZERO);
        breaker.record_failure();
        assert!(breaker.allow_request());
        breaker.guard().record_success();
        assert_eq!(breaker.get_stats()["consecutive_successes"].as_int(), Some(1));
        assert_eq!(breaker.state(), State::HalfOpen);
    }

    #[test]
    fn call_rejects_when_open() {
        let breaker = breaker(1, Duration::from_secs(60));
        let ran = AtomicUsize::new(0);
        let first: Result<()> = breaker.call(|| Err(ErrorInfo::new(5, "down")));
        assert_eq!(first.unwrap_err().code(), 5);

        let second: Result<()> = breaker.call(|| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let error = second.unwrap_err();
        assert_eq!(error.code(), codes::CIRCUIT_OPEN);
        assert_eq!(error.module(), Some("circuit_breaker"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn call_records_panics_as_failures() {
        let breaker = breaker(1, Duration::from_secs(60));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = breaker.call(|| panic!("dependency exploded"));
        }));
        assert!(outcome.is_err());
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn force_controls() {
        let breaker = CircuitBreaker::default();
        assert!(breaker.force_open());
        assert!(!breaker.force_open());
        assert!(!breaker.allow_request());
        assert!(breaker.force_closed());
        assert!(!breaker.force_closed());
        assert!(breaker.allow_request());
    }

    #[test]
    fn stats_report_name_and_threshold() {
        let breaker = CircuitBreaker::builder()
            .name("inventory")
            .failure_threshold(9)
            .build();
        assert_eq!(breaker.name(), "inventory");
        let snapshot = breaker.get_snapshot();
        assert_eq!(snapshot.component_name(), "inventory");
        assert_eq!(snapshot.get("failure_threshold").and_then(|v| v.as_int()), Some(9));
        assert_eq!(snapshot.values().len(), 6);
    }

    #[test]
    fn hooks_fire_outside_the_lock() {
        let hooks = HookRegistry::new();
        let breaker_slot: Arc<Mutex<Option<CircuitBreaker>>> = Arc::new(Mutex::new(None));
        let observed = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&breaker_slot);
        let seen = Arc::clone(&observed);
        hooks.set_on_open(move || {
            // Re-entering the breaker from a hook must not deadlock.
            if let Some(breaker) = slot.lock().as_ref() {
                *seen.lock() = Some(breaker.state());
            }
        });

        let breaker = CircuitBreaker::builder()
            .failure_threshold(1)
            .hooks(hooks)
            .build();
        *breaker_slot.lock() = Some(breaker.clone());

        breaker.record_failure();
        assert_eq!(*observed.lock(), Some(State::Open));
    }
}
