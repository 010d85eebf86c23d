//! Reference thread-pool executor.
//!
//! A fixed set of worker threads shares one queue of ready jobs and one
//! deadline-ordered queue of delayed jobs, both behind a single mutex.
//! Workers promote delayed jobs once they are due, so no separate timer
//! thread is needed.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::error::{codes, ErrorInfo};
use crate::executor::{
    execute_guarded, null_job_error, shutdown_error, Executor, ExecutorProvider, JobCompleter,
    JobHandle,
};
use crate::job::BoxedJob;
use crate::result::Result;

struct Task {
    job: BoxedJob,
    completer: JobCompleter,
}

impl Task {
    fn run(mut self) {
        let outcome = execute_guarded(self.job.as_mut());
        match &outcome {
            Ok(()) => debug!(job = self.job.name(), priority = self.job.priority(), "job completed"),
            Err(error) => debug!(job = self.job.name(), %error, "job failed"),
        }
        self.completer.complete(outcome);
    }
}

struct Delayed {
    due: Instant,
    seq: u64,
    task: Task,
}

// Reversed so that `BinaryHeap` pops the earliest deadline first; `seq`
// keeps submission order among equal deadlines.
impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Delayed {}

struct Queue {
    ready: VecDeque<Task>,
    delayed: BinaryHeap<Delayed>,
    next_seq: u64,
    accepting: bool,
    live_workers: usize,
}

impl Queue {
    fn promote_due(&mut self, now: Instant) {
        while self.delayed.peek().is_some_and(|d| d.due <= now) {
            if let Some(entry) = self.delayed.pop() {
                self.ready.push_back(entry.task);
            }
        }
    }

    fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }
}

struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
    drained: Condvar,
    running: AtomicBool,
}

impl Shared {
    fn submit(&self, job: Option<BoxedJob>, delay: Option<Duration>) -> Result<JobHandle> {
        let job = job.ok_or_else(null_job_error)?;
        let due = match delay {
            Some(delay) if !delay.is_zero() => Some(deadline_after(delay)?),
            _ => None,
        };
        let (completer, handle) = JobHandle::pair();
        let task = Task { job, completer };

        let mut queue = self.queue.lock();
        if !queue.accepting {
            warn!(job = task.job.name(), "submission rejected after shutdown");
            return Err(shutdown_error());
        }

        match due {
            Some(due) => {
                let seq = queue.next_seq;
                queue.next_seq += 1;
                queue.delayed.push(Delayed { due, seq, task });
            }
            None => queue.ready.push_back(task),
        }
        drop(queue);

        self.available.notify_one();
        Ok(handle)
    }

    /// Blocks until a task is ready; `None` once shut down and drained.
    fn next_task(&self) -> Option<Task> {
        let mut queue = self.queue.lock();
        loop {
            queue.promote_due(Instant::now());

            if let Some(task) = queue.ready.pop_front() {
                if !queue.ready.is_empty() {
                    self.available.notify_one();
                }
                return Some(task);
            }

            if !queue.accepting && queue.delayed.is_empty() {
                return None;
            }

            match queue.delayed.peek().map(|d| d.due) {
                Some(due) => {
                    let _ = self.available.wait_until(&mut queue, due);
                }
                None => self.available.wait(&mut queue),
            }
        }
    }
}

fn deadline_after(delay: Duration) -> Result<Instant> {
    Instant::now().checked_add(delay).ok_or_else(|| {
        ErrorInfo::new(codes::INVALID_ARGUMENT, "delay is too large")
            .with_module(codes::EXECUTOR_MODULE)
            .with_details(format!("{:?}", delay))
    })
}

/// Counts a worker out of the pool when its thread ends, unwinding included.
struct WorkerExit<'a>(&'a Shared);

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let mut queue = self.0.queue.lock();
        queue.live_workers = queue.live_workers.saturating_sub(1);
        drop(queue);
        self.0.drained.notify_all();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let _exit = WorkerExit(&shared);
    while let Some(task) = shared.next_task() {
        task.run();
    }
    debug!("worker exiting");
}

/// Builder for [`ThreadPoolExecutor`].
#[derive(Debug, Clone)]
pub struct ThreadPoolBuilder {
    worker_count: usize,
    thread_name: String,
}

impl Default for ThreadPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPoolBuilder {
    /// Creates a builder sized to the machine's available parallelism.
    pub fn new() -> Self {
        Self {
            worker_count: default_worker_count(),
            thread_name: "resilience-worker".to_string(),
        }
    }

    /// Sets the number of worker threads.
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Sets the prefix used for worker thread names.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Spawns the workers.
    pub fn build(self) -> Result<ThreadPoolExecutor> {
        if self.worker_count == 0 {
            return Err(ErrorInfo::new(codes::INVALID_ARGUMENT, "worker_count must be positive")
                .with_module(codes::EXECUTOR_MODULE));
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                ready: VecDeque::new(),
                delayed: BinaryHeap::new(),
                next_seq: 0,
                accepting: true,
                live_workers: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
            running: AtomicBool::new(true),
        });

        let mut pool = ThreadPoolExecutor {
            shared,
            workers: Mutex::new(Vec::with_capacity(self.worker_count)),
            worker_ids: Vec::with_capacity(self.worker_count),
            worker_count: self.worker_count,
        };

        for index in 0..self.worker_count {
            let shared = Arc::clone(&pool.shared);
            pool.shared.queue.lock().live_workers += 1;
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.thread_name, index))
                .spawn(move || worker_loop(shared));

            match spawned {
                Ok(handle) => {
                    pool.worker_ids.push(handle.thread().id());
                    pool.workers.lock().push(handle);
                }
                Err(e) => {
                    pool.shared.queue.lock().live_workers -= 1;
                    // Dropping `pool` releases the workers spawned so far.
                    return Err(ErrorInfo::new(codes::INTERNAL_ERROR, "failed to spawn worker")
                        .with_module(codes::EXECUTOR_MODULE)
                        .with_details(e.to_string()));
                }
            }
        }

        info!(workers = self.worker_count, name = %self.thread_name, "thread pool started");
        Ok(pool)
    }
}

/// Fixed-size pool of worker threads implementing [`Executor`].
///
/// Dropping the pool stops acceptance without waiting; jobs already
/// submitted finish on the detached workers.
pub struct ThreadPoolExecutor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    worker_count: usize,
}

impl ThreadPoolExecutor {
    /// Creates a pool with `worker_count` workers.
    pub fn new(worker_count: usize) -> Result<Self> {
        Self::builder().worker_count(worker_count).build()
    }

    /// Creates a builder for customizing the pool.
    pub fn builder() -> ThreadPoolBuilder {
        ThreadPoolBuilder::new()
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, job: Option<BoxedJob>) -> Result<JobHandle> {
        self.shared.submit(job, None)
    }

    fn execute_delayed(&self, job: Option<BoxedJob>, delay: Duration) -> Result<JobHandle> {
        self.shared.submit(job, Some(delay))
    }

    fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    fn pending_tasks(&self) -> usize {
        self.shared.queue.lock().len()
    }

    fn shutdown(&self, wait_for_completion: bool) {
        self.shared.queue.lock().accepting = false;
        if self.shared.running.swap(false, Ordering::AcqRel) {
            info!(wait_for_completion, "thread pool shutting down");
        }
        self.shared.available.notify_all();

        if !wait_for_completion {
            return;
        }

        let current = thread::current().id();
        let on_worker = self.worker_ids.contains(&current);

        // A job shutting down its own pool waits for every other worker.
        let mut queue = self.shared.queue.lock();
        while queue.live_workers > usize::from(on_worker) {
            self.shared.drained.wait(&mut queue);
        }
        drop(queue);

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("worker_count", &self.worker_count)
            .field("running", &self.is_running())
            .finish()
    }
}

/// [`ExecutorProvider`] backed by [`ThreadPoolExecutor`].
///
/// The shared executor is cached per provider instance.
pub struct ThreadPoolProvider {
    default_workers: usize,
    shared: OnceCell<Arc<dyn Executor>>,
}

impl Default for ThreadPoolProvider {
    fn default() -> Self {
        Self::new(default_worker_count())
    }
}

impl ThreadPoolProvider {
    /// Creates a provider whose shared executor has `default_workers` workers.
    pub fn new(default_workers: usize) -> Self {
        Self {
            default_workers,
            shared: OnceCell::new(),
        }
    }
}

impl ExecutorProvider for ThreadPoolProvider {
    fn get_executor(&self) -> Result<Arc<dyn Executor>> {
        self.shared
            .get_or_try_init(|| self.create_executor(self.default_workers))
            .map(Arc::clone)
    }

    fn create_executor(&self, worker_count: usize) -> Result<Arc<dyn Executor>> {
        let pool = ThreadPoolExecutor::new(worker_count)?;
        Ok(Arc::new(pool))
    }
}

fn default_worker_count() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}
