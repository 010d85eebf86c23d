//! Result alias and composition helpers.
//!
//! Every fallible operation in the library reports through [`Result`], whose
//! error side is always an [`ErrorInfo`]. The helpers here cover the common
//! composition shapes: early return, conditional errors, panic capture and
//! combining several independent results.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{codes, ErrorInfo};

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, ErrorInfo>;

/// Result for operations where only success or failure matters.
pub type VoidResult = Result<()>;

/// Wraps a value in the success variant.
pub fn ok<T>(value: T) -> Result<T> {
    Ok(value)
}

/// Wraps an error in the failure variant.
pub fn err<T>(error: ErrorInfo) -> Result<T> {
    Err(error)
}

/// Returns the error of `result` for early-return composition, or `None` if it is `Ok`.
pub fn return_if_error<T>(result: &Result<T>) -> Option<ErrorInfo> {
    result.as_ref().err().cloned()
}

/// Returns `error` only when `condition` holds.
pub fn error_if(condition: bool, error: ErrorInfo) -> Option<ErrorInfo> {
    if condition {
        Some(error)
    } else {
        None
    }
}

/// Builds an [`ErrorInfo`] from a code, message and optional module tag.
pub fn make_error(code: i32, message: impl Into<String>, module: Option<&str>) -> ErrorInfo {
    let error = ErrorInfo::new(code, message);
    match module {
        Some(module) => error.with_module(module),
        None => error,
    }
}

/// Builds an [`ErrorInfo`] carrying free-form details.
pub fn make_error_with_details(
    code: i32,
    message: impl Into<String>,
    module: &str,
    details: impl Into<String>,
) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_module(module)
        .with_details(details)
}

/// Runs `f`, converting a panic into an error instead of unwinding further.
///
/// String panic payloads (`panic!("...")`) keep their text as the message;
/// any other payload is reported as `"Unknown error"`. The code is always
/// [`codes::INTERNAL_ERROR`].
pub fn safe_execute<T, F>(f: F, module: Option<&str>) -> Result<T>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| make_error(codes::INTERNAL_ERROR, panic_message(&*payload), module))
}

/// Returns the contained value, or reports the error through `handler` and
/// falls back to `T::default()`.
pub fn unwrap_or_handle<T, H>(result: Result<T>, handler: H) -> T
where
    T: Default,
    H: FnOnce(&ErrorInfo),
{
    match result {
        Ok(value) => value,
        Err(error) => {
            handler(&error);
            T::default()
        }
    }
}

/// Identity pass-through kept for pipeline composition.
pub fn try_extract<T>(result: Result<T>) -> Result<T> {
    result
}

/// Feeds the value of `first` through `steps`, stopping at the first error.
pub fn chain<T, I, F>(first: Result<T>, steps: I) -> Result<T>
where
    I: IntoIterator<Item = F>,
    F: FnOnce(T) -> Result<T>,
{
    steps.into_iter().try_fold(first?, |value, step| step(value))
}

/// Tuples of results that can be merged into a single result of a tuple.
pub trait CombineResults {
    /// Tuple of the success values.
    type Output;

    /// Returns the first error in tuple order, or all values in order.
    fn combine(self) -> Result<Self::Output>;
}

macro_rules! impl_combine_results {
    ($($value:ident: $ty:ident),+) => {
        impl<$($ty),+> CombineResults for ($(Result<$ty>,)+) {
            type Output = ($($ty,)+);

            fn combine(self) -> Result<Self::Output> {
                let ($($value,)+) = self;
                // Tuple operands evaluate left to right, so `?` surfaces the first error.
                Ok(($($value?,)+))
            }
        }
    };
}

impl_combine_results!(a: A);
impl_combine_results!(a: A, b: B);
impl_combine_results!(a: A, b: B, c: C);
impl_combine_results!(a: A, b: B, c: C, d: D);
impl_combine_results!(a: A, b: B, c: C, d: D, e: E);
impl_combine_results!(a: A, b: B, c: C, d: D, e: E, f: F);
impl_combine_results!(a: A, b: B, c: C, d: D, e: E, f: F, g: G);
impl_combine_results!(a: A, b: B, c: C, d: D, e: E, f: F, g: G, h: H);

/// Combines a tuple of results; see [`CombineResults`].
pub fn combine_results<R: CombineResults>(results: R) -> Result<R::Output> {
    results.combine()
}

/// Extracts a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown error".to_string()
    }
}
