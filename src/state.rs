//! Circuit breaker state machine.

use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::window::FailureWindow;

/// Represents the possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Circuit is closed and requests are allowed.
    Closed,

    /// Circuit is open and requests are rejected.
    Open,

    /// Circuit is admitting a limited number of probes to test recovery.
    HalfOpen,
}

impl State {
    /// Upper-case name used in statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::HalfOpen => "HALF_OPEN",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change performed by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State before the change.
    pub from: State,
    /// State after the change.
    pub to: State,
}

/// Outcome of asking whether a request may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Admission {
    pub(crate) allowed: bool,
    pub(crate) transition: Option<Transition>,
}

/// Breaker state and counters.
///
/// Every method takes the current instant explicitly and performs a whole
/// transition before returning; callers serialize access with one lock.
#[derive(Debug)]
pub(crate) struct StateMachine {
    config: CircuitBreakerConfig,
    state: State,
    window: FailureWindow,
    consecutive_successes: u32,
    half_open_requests: u32,
    last_state_change: Instant,
}

impl StateMachine {
    pub(crate) fn new(config: CircuitBreakerConfig, now: Instant) -> Self {
        Self {
            window: FailureWindow::new(config.failure_window),
            config,
            state: State::Closed,
            consecutive_successes: 0,
            half_open_requests: 0,
            last_state_change: now,
        }
    }

    pub(crate) fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> State {
        self.state
    }

    pub(crate) fn failure_count(&self, now: Instant) -> usize {
        self.window.count(now)
    }

    pub(crate) fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub(crate) fn half_open_requests(&self) -> u32 {
        self.half_open_requests
    }

    pub(crate) fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_state_change)
    }

    pub(crate) fn allow_request(&mut self, now: Instant) -> Admission {
        match self.state {
            State::Closed => Admission {
                allowed: true,
                transition: None,
            },
            State::Open => {
                if self.time_in_state(now) < self.config.timeout {
                    return Admission {
                        allowed: false,
                        transition: None,
                    };
                }
                let transition = self.transition_to(State::HalfOpen, now);
                // The call that reopens the circuit is its first probe.
                self.half_open_requests = 1;
                Admission {
                    allowed: true,
                    transition: Some(transition),
                }
            }
            State::HalfOpen => {
                let allowed = self.half_open_requests < self.config.half_open_max_requests;
                if allowed {
                    self.half_open_requests += 1;
                }
                Admission {
                    allowed,
                    transition: None,
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            State::Closed => {
                self.window.clear();
                None
            }
            State::Open => None,
            State::HalfOpen => {
                self.consecutive_successes += 1;
                if self.consecutive_successes >= self.config.success_threshold {
                    Some(self.transition_to(State::Closed, now))
                } else {
                    None
                }
            }
        }
    }

    pub(crate) fn record_failure(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            State::Closed => {
                self.window.record(now);
                let failures = self.window.count(now);
                if failures >= self.config.failure_threshold as usize {
                    Some(self.transition_to(State::Open, now))
                } else {
                    None
                }
            }
            // Outcomes of calls admitted before the trip do not grow the window.
            State::Open => None,
            State::HalfOpen => {
                self.window.record(now);
                Some(self.transition_to(State::Open, now))
            }
        }
    }

    /// Moves to `to` unconditionally, unless already there.
    pub(crate) fn force(&mut self, to: State, now: Instant) -> Option<Transition> {
        if self.state == to {
            return None;
        }
        Some(self.transition_to(to, now))
    }

    fn transition_to(&mut self, to: State, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.consecutive_successes = 0;
        self.half_open_requests = 0;
        self.last_state_change = now;
        if to == State::Closed {
            self.window.clear();
        }
        Transition { from, to }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            half_open_max_requests: 3,
            failure_window: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn tripped(start: Instant) -> StateMachine {
        let mut machine = StateMachine::new(config(), start);
        for _ in 0..3 {
            machine.record_failure(start);
        }
        assert_eq!(machine.state(), State::Open);
        machine
    }

    #[test]
    fn state_names() {
        assert_eq!(State::Closed.to_string(), "CLOSED");
        assert_eq!(State::Open.to_string(), "OPEN");
        assert_eq!(State::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn starts_closed_and_allows() {
        let now = Instant::now();
        let mut machine = StateMachine::new(config(), now);
        assert_eq!(machine.state(), State::Closed);
        assert!(machine.allow_request(now).allowed);
    }

    #[test]
    fn consecutive_failures_trip_at_threshold() {
        let start = Instant::now();
        let mut machine = StateMachine::new(config(), start);
        assert_eq!(machine.record_failure(start), None);
        assert_eq!(machine.record_failure(start), None);
        assert_eq!(
            machine.record_failure(start),
            Some(Transition {
                from: State::Closed,
                to: State::Open
            })
        );
        assert_eq!(machine.failure_count(start), 3);
        assert_eq!(machine.consecutive_successes(), 0);
    }

    #[test]
    fn failures_outside_window_do_not_trip() {
        let start = Instant::now();
        let mut machine = StateMachine::new(config(), start);
        machine.record_failure(start);
        machine.record_failure(start + ms(1));
        // Both earlier failures have aged out by the third one.
        let later = start + Duration::from_secs(11);
        assert_eq!(machine.record_failure(later), None);
        assert_eq!(machine.state(), State::Closed);
        assert_eq!(machine.failure_count(later), 1);
    }

    #[test]
    fn failures_within_window_accumulate_without_success() {
        let start = Instant::now();
        let mut machine = StateMachine::new(config(), start);
        machine.record_failure(start);
        machine.record_failure(start + Duration::from_secs(4));
        machine.record_failure(start + Duration::from_secs(9));
        assert_eq!(machine.state(), State::Open);
    }

    #[test]
    fn success_clears_failure_streak() {
        let start = Instant::now();
        let mut machine = StateMachine::new(config(), start);
        machine.record_failure(start);
        machine.record_failure(start);
        assert_eq!(machine.record_success(start), None);
        assert_eq!(machine.failure_count(start), 0);
        machine.record_failure(start);
        machine.record_failure(start);
        assert_eq!(machine.state(), State::Closed);
    }

    #[test]
    fn open_rejects_until_timeout() {
        let start = Instant::now();
        let mut machine = tripped(start);
        for offset in [0, 1_000, 4_999] {
            let admission = machine.allow_request(start + ms(offset));
            assert!(!admission.allowed);
            assert_eq!(admission.transition, None);
        }
        assert_eq!(machine.state(), State::Open);
    }

    #[test]
    fn timeout_lazily_moves_to_half_open() {
        let start = Instant::now();
        let mut machine = tripped(start);
        let admission = machine.allow_request(start + Duration::from_secs(5));
        assert!(admission.allowed);
        assert_eq!(
            admission.transition,
            Some(Transition {
                from: State::Open,
                to: State::HalfOpen
            })
        );
        assert_eq!(machine.state(), State::HalfOpen);
        assert_eq!(machine.half_open_requests(), 1);
    }

    #[test]
    fn half_open_caps_probes() {
        let start = Instant::now();
        let mut machine = tripped(start);
        let later = start + Duration::from_secs(6);
        assert!(machine.allow_request(later).allowed);
        assert!(machine.allow_request(later).allowed);
        assert!(machine.allow_request(later).allowed);
        assert!(!machine.allow_request(later).allowed);
        assert!(!machine.allow_request(later).allowed);
        assert_eq!(machine.half_open_requests(), 3);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let start = Instant::now();
        let mut machine = tripped(start);
        let later = start + Duration::from_secs(6);
        machine.allow_request(later);

        assert_eq!(machine.record_success(later), None);
        assert_eq!(machine.consecutive_successes(), 1);
        assert_eq!(
            machine.record_success(later),
            Some(Transition {
                from: State::HalfOpen,
                to: State::Closed
            })
        );
        assert_eq!(machine.failure_count(later), 0);
        assert_eq!(machine.consecutive_successes(), 0);
        assert_eq!(machine.half_open_requests(), 0);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let start = Instant::now();
        let mut machine = tripped(start);
        let later = start + Duration::from_secs(6);
        machine.allow_request(later);
        machine.record_success(later);

        assert_eq!(
            machine.record_failure(later),
            Some(Transition {
                from: State::HalfOpen,
                to: State::Open
            })
        );
        assert_eq!(machine.consecutive_successes(), 0);
        assert_eq!(machine.half_open_requests(), 0);
        // The reopened circuit waits a full timeout from the new failure.
        assert!(!machine.allow_request(later + Duration::from_secs(4)).allowed);
        assert!(machine.allow_request(later + Duration::from_secs(5)).allowed);
    }

    #[test]
    fn open_ignores_outcomes() {
        let start = Instant::now();
        let mut machine = tripped(start);
        assert_eq!(machine.record_success(start), None);
        assert_eq!(machine.record_failure(start), None);
        assert_eq!(machine.state(), State::Open);
        assert_eq!(machine.failure_count(start), 3);
    }

    #[test]
    fn failure_storm_while_open_does_not_grow_window() {
        let start = Instant::now();
        let mut machine = tripped(start);
        for i in 0..10_000 {
            assert_eq!(machine.record_failure(start + ms(i % 4_000)), None);
        }
        assert_eq!(machine.failure_count(start), 3);
        assert_eq!(machine.window.len(), 3);
    }

    #[test]
    fn force_is_noop_for_current_state() {
        let start = Instant::now();
        let mut machine = StateMachine::new(config(), start);
        assert_eq!(machine.force(State::Closed, start), None);
        assert!(machine.force(State::Open, start).is_some());
        assert!(!machine.allow_request(start).allowed);
        assert!(machine.force(State::Closed, start).is_some());
        assert!(machine.allow_request(start).allowed);
    }
}
