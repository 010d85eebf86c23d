//! Configuration for circuit breakers.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::breaker::CircuitBreaker;
use crate::error::{codes, ErrorInfo};
use crate::hook::HookRegistry;
use crate::metrics::{MetricSink, NullMetricSink};
use crate::result::VoidResult;

/// Thresholds and timings of a circuit breaker.
///
/// Read-only once the breaker is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures within `failure_window` that trip the circuit (Closed -> Open).
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit (HalfOpen -> Closed).
    pub success_threshold: u32,

    /// Probes admitted while half-open.
    pub half_open_max_requests: u32,

    /// Failures older than this no longer count toward `failure_threshold`.
    pub failure_window: Duration,

    /// Time spent open before a probe is admitted.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            half_open_max_requests: 3,
            failure_window: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Checks that every count is positive.
    pub fn validate(&self) -> VoidResult {
        let checks = [
            ("failure_threshold", self.failure_threshold),
            ("success_threshold", self.success_threshold),
            ("half_open_max_requests", self.half_open_max_requests),
        ];
        match checks.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ErrorInfo::new(
                codes::INVALID_ARGUMENT,
                format!("{} must be positive", field),
            )
            .with_module(codes::BREAKER_MODULE)),
            None => Ok(()),
        }
    }

    /// Raises zero counts to one.
    pub(crate) fn normalized(self) -> Self {
        if let Err(error) = self.validate() {
            warn!(%error, "clamping circuit breaker config");
        }
        Self {
            failure_threshold: self.failure_threshold.max(1),
            success_threshold: self.success_threshold.max(1),
            half_open_max_requests: self.half_open_max_requests.max(1),
            ..self
        }
    }
}

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder {
    config: CircuitBreakerConfig,
    name: String,
    metric_sink: Arc<dyn MetricSink>,
    hook_registry: Arc<HookRegistry>,
}

impl Default for BreakerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: CircuitBreakerConfig::default(),
            name: "circuit_breaker".to_string(),
            metric_sink: Arc::new(NullMetricSink),
            hook_registry: Arc::new(HookRegistry::new()),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: CircuitBreakerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the number of failures within the window that trips the circuit.
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Sets the number of consecutive half-open successes required to close.
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    /// Sets the number of probes admitted while half-open.
    pub fn half_open_max_requests(mut self, max: u32) -> Self {
        self.config.half_open_max_requests = max;
        self
    }

    /// Sets how long a failure keeps counting toward the threshold.
    pub fn failure_window(mut self, window: Duration) -> Self {
        self.config.failure_window = window;
        self
    }

    /// Sets how long the circuit stays open before probing.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the component name reported through the stats contract.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets a metric sink for the circuit breaker.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.metric_sink = Arc::new(sink);
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hook_registry = Arc::new(hooks);
        self
    }

    /// Builds the breaker, rejecting zero counts.
    pub fn try_build(self) -> crate::Result<CircuitBreaker> {
        self.config.validate()?;
        Ok(self.build())
    }

    /// Builds the breaker; zero counts are raised to one.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::from_parts(
            self.config.normalized(),
            self.name,
            self.metric_sink,
            self.hook_registry,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.half_open_max_requests, 3);
        assert_eq!(config.failure_window, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_names_the_zero_field() {
        let config = CircuitBreakerConfig {
            success_threshold: 0,
            ..Default::default()
        };
        let error = config.validate().unwrap_err();
        assert_eq!(error.code(), codes::INVALID_ARGUMENT);
        assert_eq!(error.message(), "success_threshold must be positive");
    }

    #[test]
    fn normalized_clamps_zeroes() {
        let config = CircuitBreakerConfig {
            failure_threshold: 0,
            half_open_max_requests: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.failure_threshold, 1);
        assert_eq!(config.half_open_max_requests, 1);
        assert_eq!(config.success_threshold, 2);
    }

    #[test]
    fn builder_sets_fields() {
        let breaker = BreakerBuilder::new()
            .failure_threshold(7)
            .success_threshold(4)
            .half_open_max_requests(1)
            .failure_window(Duration::from_secs(5))
            .timeout(Duration::from_millis(250))
            .name("payments")
            .build();
        let config = breaker.config();
        assert_eq!(config.failure_threshold, 7);
        assert_eq!(config.success_threshold, 4);
        assert_eq!(config.half_open_max_requests, 1);
        assert_eq!(config.failure_window, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_millis(250));
    }

    #[test]
    fn try_build_rejects_invalid() {
        assert!(BreakerBuilder::new().failure_threshold(0).try_build().is_err());
        assert!(BreakerBuilder::new().try_build().is_ok());
    }
}
