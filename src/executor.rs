//! Executor contract: asynchronous job submission with results delivered
//! through a [`JobHandle`].

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use tracing::warn;

use crate::error::{codes, ErrorInfo};
use crate::job::{BoxedJob, Job};
use crate::result::{make_error, panic_message, Result, VoidResult};

/// Something that runs jobs off the caller's thread.
///
/// `execute` and `execute_delayed` must never block the caller. Every
/// outcome of a job, including a panic, reaches the caller through the
/// returned [`JobHandle`].
pub trait Executor: Send + Sync {
    /// Schedules `job` for execution as soon as a worker is free.
    ///
    /// A missing job is rejected immediately with [`codes::NULL_JOB`].
    fn execute(&self, job: Option<BoxedJob>) -> Result<JobHandle>;

    /// Schedules `job` to start no earlier than `delay` from now.
    ///
    /// A delay whose deadline cannot be represented is rejected with
    /// [`codes::INVALID_ARGUMENT`].
    fn execute_delayed(&self, job: Option<BoxedJob>, delay: Duration) -> Result<JobHandle>;

    /// Number of workers configured at construction.
    fn worker_count(&self) -> usize;

    /// Whether the executor still accepts submissions.
    fn is_running(&self) -> bool;

    /// Approximate number of submitted jobs that have not started yet.
    fn pending_tasks(&self) -> usize;

    /// Stops accepting submissions. Jobs already submitted still run; with
    /// `wait_for_completion` the call blocks until they have finished.
    /// Concurrent waiting callers all block; a caller running on one of the
    /// executor's own workers waits for the other workers only.
    fn shutdown(&self, wait_for_completion: bool);
}

/// Hands out executors.
pub trait ExecutorProvider {
    /// Returns this provider's shared executor, creating it on first use.
    fn get_executor(&self) -> Result<Arc<dyn Executor>>;

    /// Creates a new executor independent of the shared one.
    fn create_executor(&self, worker_count: usize) -> Result<Arc<dyn Executor>>;
}

/// Receiving side of a submitted job's outcome.
///
/// Resolves exactly once: `Ok(())` when the job succeeded, otherwise the
/// job's error. It can be awaited or waited on synchronously.
#[derive(Debug)]
#[must_use = "a JobHandle is the only way to observe the job's outcome"]
pub struct JobHandle {
    rx: oneshot::Receiver<VoidResult>,
}

/// Sending side paired with a [`JobHandle`].
#[derive(Debug)]
pub struct JobCompleter {
    tx: oneshot::Sender<VoidResult>,
}

impl JobHandle {
    /// Creates a connected completer/handle pair for executor implementations.
    pub fn pair() -> (JobCompleter, JobHandle) {
        let (tx, rx) = oneshot::channel();
        (JobCompleter { tx }, JobHandle { rx })
    }

    /// Blocks the current thread until the job has finished.
    pub fn wait(self) -> VoidResult {
        futures::executor::block_on(self)
    }

    /// Returns the outcome if it is already available.
    pub fn try_result(&mut self) -> Option<VoidResult> {
        match self.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => Some(Err(dropped_error())),
        }
    }
}

impl Future for JobHandle {
    type Output = VoidResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(dropped_error())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl JobCompleter {
    /// Delivers the outcome. A handle that was already dropped is ignored.
    pub fn complete(self, outcome: VoidResult) {
        let _ = self.tx.send(outcome);
    }
}

/// Runs a job, converting a panic into an error tagged with the executor module.
pub fn execute_guarded(job: &mut dyn Job) -> VoidResult {
    match panic::catch_unwind(AssertUnwindSafe(|| job.execute())) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(&*payload);
            warn!(job = job.name(), panic = %message, "job panicked");
            Err(make_error(
                codes::INTERNAL_ERROR,
                message,
                Some(codes::EXECUTOR_MODULE),
            ))
        }
    }
}

/// Error returned for a missing job.
pub fn null_job_error() -> ErrorInfo {
    ErrorInfo::new(codes::NULL_JOB, "Null job provided").with_module(codes::EXECUTOR_MODULE)
}

/// Error returned for submissions after shutdown.
pub fn shutdown_error() -> ErrorInfo {
    ErrorInfo::new(codes::EXECUTOR_SHUTDOWN, "Executor is shut down")
        .with_module(codes::EXECUTOR_MODULE)
}

fn dropped_error() -> ErrorInfo {
    ErrorInfo::new(codes::JOB_DROPPED, "Job was dropped before completion")
        .with_module(codes::EXECUTOR_MODULE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FnJob;

    #[test]
    fn handle_delivers_outcome_once() {
        let (completer, mut handle) = JobHandle::pair();
        assert!(handle.try_result().is_none());
        completer.complete(Err(ErrorInfo::new(5, "failed")));
        assert_eq!(handle.try_result().unwrap().unwrap_err().code(), 5);
    }

    #[test]
    fn dropped_completer_resolves_to_error() {
        let (completer, handle) = JobHandle::pair();
        drop(completer);
        assert_eq!(handle.wait().unwrap_err().code(), codes::JOB_DROPPED);
    }

    #[test]
    fn completing_after_handle_dropped_is_silent() {
        let (completer, handle) = JobHandle::pair();
        drop(handle);
        completer.complete(Ok(()));
    }

    #[test]
    fn guarded_execution_converts_panics() {
        let mut job = FnJob::new("explode", || -> VoidResult { panic!("kaboom") });
        let error = execute_guarded(&mut job).unwrap_err();
        assert_eq!(error.code(), codes::INTERNAL_ERROR);
        assert_eq!(error.message(), "kaboom");
        assert_eq!(error.module(), Some("executor"));
    }

    #[test]
    fn guarded_execution_passes_errors_through() {
        let mut job = FnJob::new("err", || Err(ErrorInfo::new(12, "no disk")));
        assert_eq!(execute_guarded(&mut job).unwrap_err().message(), "no disk");
    }
}
