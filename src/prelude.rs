//! Re-exports the types most callers need.
//!
//! # Example
//! ```rust,no_run
//! use resilience_rs::prelude::*;
//!
//! let breaker = CircuitBreaker::default();
//! let _ = breaker.allow_request();
//! ```

pub use crate::breaker::CircuitBreaker;
pub use crate::error::ErrorInfo;
pub use crate::executor::{Executor, ExecutorProvider, JobHandle};
pub use crate::job::{FnJob, Job};
pub use crate::result::{Result, VoidResult};
pub use crate::state::State;
pub use crate::stats::Stats;
