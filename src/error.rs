//! Error vocabulary shared by every component of the library.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Stable error codes produced by this crate.
pub mod codes {
    /// A caller supplied an invalid argument or configuration value.
    pub const INVALID_ARGUMENT: i32 = -1;

    /// Sentinel code for faults caught at a boundary (panics inside closures).
    pub const INTERNAL_ERROR: i32 = -99;

    /// No job was handed to an executor.
    pub const NULL_JOB: i32 = 1;

    /// The executor no longer accepts submissions.
    pub const EXECUTOR_SHUTDOWN: i32 = 2;

    /// The job was dropped before it could deliver a result.
    pub const JOB_DROPPED: i32 = 3;

    /// A call was rejected because the circuit is open.
    pub const CIRCUIT_OPEN: i32 = 10;

    /// Module tag attached to executor errors.
    pub const EXECUTOR_MODULE: &str = "executor";

    /// Module tag attached to circuit breaker errors.
    pub const BREAKER_MODULE: &str = "circuit_breaker";
}

/// Structured error record carried by [`Result`](crate::Result).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    code: i32,
    message: String,
    module: Option<String>,
    details: Option<String>,
}

impl ErrorInfo {
    /// Creates an error with a code and message.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            module: None,
            details: None,
        }
    }

    /// Attaches the module tag that produced the error.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Attaches free-form details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Numeric error code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Module tag, if any.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Details, if any.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "[{}] {} (code {})", module, self.message, self.code)?,
            None => write!(f, "{} (code {})", self.message, self.code)?,
        }
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl Error for ErrorInfo {}
