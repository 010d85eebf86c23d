//! # resilience-rs
//!
//! Building blocks for fault-tolerant concurrent code:
//!
//! - a [`Result`] alias over [`ErrorInfo`] with composition helpers such as
//!   [`safe_execute`] and [`combine_results`],
//! - an [`Executor`] contract for running [`Job`]s off the caller's thread,
//!   with outcomes delivered through a [`JobHandle`],
//! - a [`CircuitBreaker`] whose live metrics are exposed through the
//!   [`Stats`] contract.
//!
//! ## Breaker states
//!
//! - **Closed**: requests pass. Failures are counted over a sliding
//!   `failure_window`; reaching `failure_threshold` opens the circuit.
//! - **Open**: requests are refused until `timeout` has elapsed. The first
//!   request after that moves the circuit to half-open and is let through.
//! - **Half-open**: up to `half_open_max_requests` probes are admitted.
//!   `success_threshold` consecutive successes close the circuit; any
//!   failure reopens it.
//!
//! ## Basic Usage
//!
//! ```rust
//! use resilience_rs::{CircuitBreaker, ErrorInfo, State, Stats};
//! use std::time::Duration;
//!
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(2)
//!     .timeout(Duration::from_secs(30))
//!     .build();
//!
//! if breaker.allow_request() {
//!     // Call the dependency, then report how it went.
//!     breaker.record_failure();
//! }
//! breaker.record_failure();
//!
//! assert_eq!(breaker.state(), State::Open);
//! assert!(!breaker.allow_request());
//! println!("{}", breaker.to_json());
//!
//! let outcome = breaker.call(|| Ok::<_, ErrorInfo>("cached"));
//! assert!(outcome.is_err());
//! ```
//!
//! ## Running jobs
//!
//! ```rust
//! use resilience_rs::{Executor, FnJob, ThreadPoolExecutor};
//!
//! let pool = ThreadPoolExecutor::new(2)?;
//! let handle = pool.execute(FnJob::boxed("hello", || Ok(())))?;
//! assert!(handle.wait().is_ok());
//! pool.shutdown(true);
//! # Ok::<(), resilience_rs::ErrorInfo>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod breaker;
mod config;
mod error;
mod executor;
mod hook;
mod job;
mod metrics;
mod pool;
pub mod prelude;
mod result;
mod state;
mod stats;
mod window;

// Re-exports
pub use breaker::{BreakerGuard, CircuitBreaker};
pub use config::{BreakerBuilder, CircuitBreakerConfig};
pub use error::{codes, ErrorInfo};
pub use executor::{
    execute_guarded, null_job_error, shutdown_error, Executor, ExecutorProvider, JobCompleter,
    JobHandle,
};
pub use hook::HookRegistry;
pub use job::{BoxedJob, FnJob, Job};
pub use metrics::{MetricSink, NullMetricSink};
pub use pool::{ThreadPoolBuilder, ThreadPoolExecutor, ThreadPoolProvider};
pub use result::{
    chain, combine_results, err, error_if, make_error, make_error_with_details, ok,
    return_if_error, safe_execute, try_extract, unwrap_or_handle, CombineResults, Result,
    VoidResult,
};
pub use state::{State, Transition};
pub use stats::{Stats, StatsMap, StatsSnapshot, StatsValue};
