//! Fixed-size worker pool with observable worker identity.
//!
//! This is the execution substrate the experiment measures. It supports:
//!
//! - **Fixed parallelism**: a configurable number of worker threads, spawned
//!   eagerly at construction and alive for the pool's whole lifetime
//! - **FIFO queueing**: a lock-free global queue drained by all workers
//! - **Identity**: every worker's [`ThreadId`] is recorded at construction,
//!   so "is this thread one of yours?" is answerable from any thread
//! - **Shutdown**: graceful shutdown with bounded drain timeout
//!
//! # Design
//!
//! Two submission shapes exist, and the difference between them is the whole
//! experiment:
//!
//! - [`PoolHandle::invoke`] runs a closure on a pool worker while the caller
//!   parks on a condvar. The caller never executes the closure itself.
//! - [`PoolHandle::submit`] + [`PoolHandle::try_run_one`] let any thread
//!   (including the submitting caller) drain queued work cooperatively.
//!   Join loops in the reduction use this, which is how leaf work can
//!   legitimately end up on the caller thread.
//!
//! A worker thread belongs to exactly one pool for the pool's lifetime.
//! Two pools built from equal [`PoolOptions`] are still distinct instances
//! with disjoint worker sets.

use crossbeam_queue::SegQueue;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle as ThreadJoinHandle, ThreadId};
use std::time::Duration;

/// Backoff for idle workers parked on the condvar.
///
/// The queue is lock-free, so a push can race a worker's empty-check; the
/// timed wait bounds how long such a race can delay pickup.
const IDLE_PARK: Duration = Duration::from_millis(10);

/// How many queue chunks the split heuristic aims at per worker.
const CHUNKS_PER_WORKER: u64 = 4;

/// A unit of work queued on the pool.
type Job = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for a [`WorkerPool`].
///
/// The experiment requires its two pool instances to be configured
/// identically; constructing both from one cloned `PoolOptions` guarantees
/// equal parallelism, equal thread naming scheme, equal FIFO queueing, and
/// equal panic policy (panics are captured per task and re-raised at the
/// join or invoke site).
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of worker threads.
    pub parallelism: usize,
    /// Thread name prefix; workers are named `{prefix}-worker-{i}`.
    pub thread_name_prefix: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            thread_name_prefix: "poolwitness".to_string(),
        }
    }
}

impl PoolOptions {
    /// Returns these options with a different thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

/// The hardware parallelism, with a conservative fallback.
#[must_use]
pub fn default_parallelism() -> usize {
    thread::available_parallelism().map_or(2, NonZeroUsize::get)
}

struct PoolInner {
    /// Configured worker count.
    parallelism: usize,
    /// Global FIFO work queue.
    queue: SegQueue<Job>,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Number of workers still in their run loop.
    active_workers: AtomicUsize,
    /// Condition variable for idle worker parking.
    idle_condvar: Condvar,
    /// Mutex for the idle condvar.
    idle_mutex: Mutex<()>,
    /// Worker thread identities, set once at construction.
    members: OnceLock<Vec<ThreadId>>,
    /// Worker join handles for cleanup.
    worker_handles: Mutex<Vec<ThreadJoinHandle<()>>>,
}

/// An owned worker pool.
///
/// Dropping the pool shuts it down and waits briefly for workers to exit.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("parallelism", &self.inner.parallelism)
            .field(
                "active_workers",
                &self.inner.active_workers.load(Ordering::Relaxed),
            )
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}

/// A cloneable handle to a [`WorkerPool`].
///
/// Handle identity is pool identity: two handles are handles to the same
/// pool iff they were cloned from the same `WorkerPool`.
#[derive(Clone)]
pub struct PoolHandle {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("parallelism", &self.inner.parallelism)
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool with the given parallelism and default options.
    ///
    /// # Panics
    ///
    /// Panics if `parallelism` is 0.
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self::with_options(PoolOptions {
            parallelism,
            ..PoolOptions::default()
        })
    }

    /// Creates a pool from explicit options.
    ///
    /// All workers are spawned eagerly; their identities are recorded before
    /// this constructor returns, so membership queries are valid immediately.
    ///
    /// # Panics
    ///
    /// Panics if `options.parallelism` is 0 or a worker thread cannot be
    /// spawned.
    #[must_use]
    pub fn with_options(options: PoolOptions) -> Self {
        assert!(options.parallelism > 0, "parallelism must be at least 1");

        let inner = Arc::new(PoolInner {
            parallelism: options.parallelism,
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            active_workers: AtomicUsize::new(0),
            idle_condvar: Condvar::new(),
            idle_mutex: Mutex::new(()),
            members: OnceLock::new(),
            worker_handles: Mutex::new(Vec::with_capacity(options.parallelism)),
        });

        let mut ids = Vec::with_capacity(options.parallelism);
        let mut handles = Vec::with_capacity(options.parallelism);
        for index in 0..options.parallelism {
            let worker_inner = Arc::clone(&inner);
            let name = format!("{}-worker-{index}", options.thread_name_prefix);
            inner.active_workers.fetch_add(1, Ordering::Relaxed);
            let handle = thread::Builder::new()
                .name(name)
                .spawn(move || {
                    worker_loop(&worker_inner);
                    worker_inner.active_workers.fetch_sub(1, Ordering::Release);
                })
                .expect("failed to spawn pool worker");
            ids.push(handle.thread().id());
            handles.push(handle);
        }
        let _ = inner.members.set(ids);
        *inner.worker_handles.lock().unwrap() = handles;

        Self { inner }
    }

    /// Returns a cloneable handle to this pool.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Initiates shutdown. No new work should be submitted afterwards;
    /// already-queued work is still drained.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        self.notify_all();
    }

    /// Shuts down and waits for all workers to exit.
    ///
    /// Returns `true` if every worker exited within `timeout`.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let deadline = std::time::Instant::now() + timeout;
        while self.inner.active_workers.load(Ordering::Acquire) > 0 {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            self.notify_all();
            thread::sleep(Duration::from_millis(5).min(remaining));
        }

        let mut handles = self.inner.worker_handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
        true
    }

    fn notify_all(&self) {
        let _guard = self.inner.idle_mutex.lock().unwrap();
        self.inner.idle_condvar.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown_and_wait(Duration::from_secs(5));
    }
}

impl PoolHandle {
    /// Returns the configured worker count.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.inner.parallelism
    }

    /// Returns `true` if `id` is one of this pool's worker threads.
    #[must_use]
    pub fn is_worker(&self, id: ThreadId) -> bool {
        self.inner
            .members
            .get()
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Returns `true` if the two handles refer to the same pool instance.
    #[must_use]
    pub fn same_pool(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The interval length at or below which a range should stop splitting.
    ///
    /// This is a scheduling heuristic owned by the pool, aiming for a few
    /// queue chunks per worker. Callers must treat the value as opaque: it
    /// may change between versions, and the experiment depends on tasks
    /// honoring whatever the pool chooses rather than picking their own.
    #[must_use]
    pub fn split_grain(&self, len: u64) -> u64 {
        let chunks = (self.inner.parallelism as u64).saturating_mul(CHUNKS_PER_WORKER);
        (len / chunks.max(1)).max(1)
    }

    /// Queues a job for execution by the pool's workers.
    ///
    /// Any thread may later steal it back via [`try_run_one`](Self::try_run_one);
    /// the pool makes no promise about *which* thread runs a submitted job,
    /// only that some thread eventually does.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        self.inner.queue.push(Box::new(job));
        let _guard = self.inner.idle_mutex.lock().unwrap();
        self.inner.idle_condvar.notify_one();
    }

    /// Pops one queued job and runs it on the current thread.
    ///
    /// Returns `false` if the queue was empty. This is the cooperative half
    /// of the fork/join discipline: a thread blocked on a join drains queued
    /// work instead of sleeping, so joins cannot deadlock even when every
    /// worker is itself inside a join.
    pub fn try_run_one(&self) -> bool {
        if let Some(job) = self.inner.queue.pop() {
            job();
            true
        } else {
            false
        }
    }

    /// Runs `f` on a pool worker, blocking the caller until it completes.
    ///
    /// The caller parks on a condvar and never executes `f` itself; that is
    /// the property distinguishing `invoke` from caller-rooted submission,
    /// and the reproducible scenarios depend on it.
    ///
    /// # Panics
    ///
    /// If `f` panics on the worker, the panic is re-raised here.
    pub fn invoke<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let cell = Arc::new(TaskCell::new());
        let task_cell = Arc::clone(&cell);
        self.submit(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f));
            task_cell.complete(result);
        });
        match cell.wait() {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// Completion cell for [`PoolHandle::invoke`].
struct TaskCell<T> {
    slot: Mutex<Option<thread::Result<T>>>,
    condvar: Condvar,
}

impl<T> TaskCell<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            condvar: Condvar::new(),
        }
    }

    fn complete(&self, result: thread::Result<T>) {
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(result);
        drop(slot);
        self.condvar.notify_all();
    }

    fn wait(&self) -> thread::Result<T> {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            slot = self.condvar.wait(slot).unwrap();
        }
    }
}

/// The worker run loop: drain the queue, park when idle, exit on shutdown.
fn worker_loop(inner: &PoolInner) {
    loop {
        if let Some(job) = inner.queue.pop() {
            // Panics are captured so one poisoned task cannot kill the
            // worker; completion cells re-raise at the join/invoke site.
            let _ = panic::catch_unwind(AssertUnwindSafe(job));
            continue;
        }

        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }

        let guard = inner.idle_mutex.lock().unwrap();
        if inner.queue.is_empty() && !inner.shutdown.load(Ordering::Acquire) {
            let _unused = inner.idle_condvar.wait_timeout(guard, IDLE_PARK).unwrap();
        }
    }
}

/// Which of the experiment's two long-lived pool instances a scenario means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolRole {
    /// The process-wide default pool.
    Common,
    /// The explicitly constructed pool with identical configuration.
    Alternate,
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "common"),
            Self::Alternate => write!(f, "alternate"),
        }
    }
}

/// The two pool instances shared by every trial in a run.
///
/// Both are built from one cloned [`PoolOptions`], so they differ only in
/// identity, which is exactly what the sanity-check scenarios need to
/// prove. Construct once at startup and pass by reference; recreating pools
/// per trial would change the phenomenon being measured.
#[derive(Debug)]
pub struct PoolPair {
    common: WorkerPool,
    alternate: WorkerPool,
}

impl PoolPair {
    /// Builds both pools from equal options.
    ///
    /// # Panics
    ///
    /// Panics if `options.parallelism` is 0.
    #[must_use]
    pub fn new(options: PoolOptions) -> Self {
        let prefix = options.thread_name_prefix.clone();
        let common = WorkerPool::with_options(
            options
                .clone()
                .with_thread_name_prefix(format!("{prefix}-common")),
        );
        let alternate =
            WorkerPool::with_options(options.with_thread_name_prefix(format!("{prefix}-alt")));
        Self { common, alternate }
    }

    /// Handle to the default pool.
    #[must_use]
    pub fn common(&self) -> PoolHandle {
        self.common.handle()
    }

    /// Handle to the alternate pool.
    #[must_use]
    pub fn alternate(&self) -> PoolHandle {
        self.alternate.handle()
    }

    /// Handle to the pool a [`PoolRole`] names.
    #[must_use]
    pub fn handle(&self, role: PoolRole) -> PoolHandle {
        match role {
            PoolRole::Common => self.common(),
            PoolRole::Alternate => self.alternate(),
        }
    }
}
