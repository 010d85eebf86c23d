//! Units of work accepted by an [`Executor`](crate::Executor).

use std::fmt;

use crate::result::VoidResult;

/// A named unit of work with a single execution entry point.
pub trait Job: Send {
    /// Name used in logs.
    fn name(&self) -> &str {
        "job"
    }

    /// Scheduling hint; higher runs earlier on executors that honor it.
    ///
    /// [`ThreadPoolExecutor`](crate::ThreadPoolExecutor) runs jobs in
    /// submission order and ignores it.
    fn priority(&self) -> i32 {
        0
    }

    /// Runs the job.
    fn execute(&mut self) -> VoidResult;
}

/// Owned, type-erased job as handed to an executor.
pub type BoxedJob = Box<dyn Job>;

/// A job backed by a closure.
pub struct FnJob<F> {
    name: String,
    f: F,
}

impl<F> FnJob<F>
where
    F: FnMut() -> VoidResult + Send,
{
    /// Wraps `f` as a job called `name`.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Wraps `f` and boxes it, ready for submission.
    pub fn boxed(name: impl Into<String>, f: F) -> Option<BoxedJob>
    where
        F: 'static,
    {
        Some(Box::new(Self::new(name, f)))
    }
}

impl<F> Job for FnJob<F>
where
    F: FnMut() -> VoidResult + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> VoidResult {
        (self.f)()
    }
}

impl<F> fmt::Debug for FnJob<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnJob").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorInfo;

    #[test]
    fn fn_job_runs_closure() {
        let mut calls = 0;
        let mut job = FnJob::new("count", || {
            calls += 1;
            Ok(())
        });
        assert_eq!(job.name(), "count");
        assert!(job.execute().is_ok());
        assert!(job.execute().is_ok());
        drop(job);
        assert_eq!(calls, 2);
    }

    struct Urgent;

    impl Job for Urgent {
        fn priority(&self) -> i32 {
            10
        }

        fn execute(&mut self) -> VoidResult {
            Ok(())
        }
    }

    #[test]
    fn priority_defaults_to_zero() {
        let job = FnJob::new("plain", || Ok(()));
        assert_eq!(job.priority(), 0);
        assert_eq!(Urgent.priority(), 10);
        assert_eq!(Urgent.name(), "job");
    }

    #[test]
    fn fn_job_propagates_error() {
        let mut job = FnJob::new("fail", || Err(ErrorInfo::new(4, "bad")));
        assert_eq!(job.execute().unwrap_err().message(), "bad");
    }
}
