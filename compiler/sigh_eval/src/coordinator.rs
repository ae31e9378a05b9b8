//! Concurrency coordinator: the worker pool behind `launch`, the per-site
//! locks behind `protect`, and the drain performed when a run ends.
//!
//! One [`Coordinator`] exists per run and is shared by every task through
//! `Arc`, so tasks may spawn further tasks. The main program runs on the
//! caller's thread, outside the pool.
//!
//! A task is a closure producing `Result<(), EvalError>`. Faults and panics
//! stop only the task that raised them: they are logged and collected as
//! [`TaskFailure`]s for the run report.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashMap;
use sigh_ir::NodeId;
use tracing::{debug, error, warn};

use crate::errors::{pool_startup, task_panicked, EvalError};
use crate::print_handler::{stdout_handler, SharedPrintHandler};

/// Settings of one run.
#[derive(Clone)]
pub struct RunConfig {
    /// Number of worker threads.
    pub pool_size: usize,
    /// Sleep between two checks of `wait`.
    pub wait_poll_interval: Duration,
    /// Interval at which the final drain reports progress.
    pub drain_poll_interval: Duration,
    /// Give up draining after this long; `None` drains until done.
    pub drain_timeout: Option<Duration>,
    pub print_handler: SharedPrintHandler,
}

impl RunConfig {
    /// Twice the available hardware parallelism, or 2 when unknown.
    pub fn default_pool_size() -> usize {
        std::thread::available_parallelism().map_or(2, |n| n.get() * 2)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            pool_size: Self::default_pool_size(),
            wait_poll_interval: Duration::from_millis(20),
            drain_poll_interval: Duration::from_millis(1000),
            drain_timeout: None,
            print_handler: stdout_handler(),
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("pool_size", &self.pool_size)
            .field("wait_poll_interval", &self.wait_poll_interval)
            .field("drain_poll_interval", &self.drain_poll_interval)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}

/// Sequence number of a spawned task, unique within a run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// A task that ended with a fault or a panic.
#[derive(Clone, Debug)]
pub struct TaskFailure {
    pub task: TaskId,
    pub error: EvalError,
}

/// Outcome of the end-of-run drain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrainStatus {
    /// Every task finished.
    Complete,
    /// The drain timeout elapsed with tasks still running.
    Incomplete { pending: usize },
}

impl DrainStatus {
    #[inline]
    pub fn is_complete(self) -> bool {
        matches!(self, DrainStatus::Complete)
    }
}

/// Locks for protect-blocks, one per program point.
///
/// All dynamic executions of the same block, in any task, share one lock.
/// Locks are created on first entry; concurrent first entries still agree
/// on a single lock. Locks are reentrant, so a task already holding a
/// site's lock may enter it again (e.g. through recursion).
#[derive(Default)]
pub struct ProtectSites {
    sites: RwLock<FxHashMap<NodeId, Arc<ReentrantMutex<()>>>>,
}

impl ProtectSites {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock of the protect-block at `site`, created if needed.
    pub fn lock_for(&self, site: NodeId) -> Arc<ReentrantMutex<()>> {
        if let Some(lock) = self.sites.read().get(&site) {
            return Arc::clone(lock);
        }
        let mut sites = self.sites.write();
        let lock = sites.entry(site).or_insert_with(|| {
            debug!(?site, "protect lock created");
            Arc::new(ReentrantMutex::new(()))
        });
        Arc::clone(lock)
    }

    /// Number of sites entered so far.
    pub fn len(&self) -> usize {
        self.sites.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.read().is_empty()
    }
}

/// Shared state of a run's tasks.
pub struct Coordinator {
    pool: rayon::ThreadPool,
    config: RunConfig,
    next_task: AtomicU64,
    pending: Mutex<usize>,
    idle: Condvar,
    failures: Mutex<Vec<TaskFailure>>,
    protect_sites: ProtectSites,
    closed: AtomicBool,
}

impl Coordinator {
    /// Start the worker pool.
    pub fn start(config: RunConfig) -> Result<Arc<Self>, EvalError> {
        let pool_size = config.pool_size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(|i| format!("sigh-task-{i}"))
            .panic_handler(|payload| {
                error!(message = %panic_message(payload.as_ref()), "worker panicked");
            })
            .build()
            .map_err(pool_startup)?;
        debug!(pool_size, "worker pool started");
        Ok(Arc::new(Coordinator {
            pool,
            config,
            next_task: AtomicU64::new(0),
            pending: Mutex::new(0),
            idle: Condvar::new(),
            failures: Mutex::new(Vec::new()),
            protect_sites: ProtectSites::new(),
            closed: AtomicBool::new(false),
        }))
    }

    #[inline]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[inline]
    pub fn print_handler(&self) -> &SharedPrintHandler {
        &self.config.print_handler
    }

    #[inline]
    pub fn protect_sites(&self) -> &ProtectSites {
        &self.protect_sites
    }

    /// Submit a task to the pool. Returns immediately.
    pub fn spawn<F>(self: &Arc<Self>, task: F) -> TaskId
    where
        F: FnOnce() -> Result<(), EvalError> + Send + 'static,
    {
        let id = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        // Counted before submission, so a drain can never observe zero
        // while a spawning task is still running.
        *self.pending.lock() += 1;
        debug!(task = %id, "task submitted");

        let coordinator = Arc::clone(self);
        self.pool.spawn(move || {
            let _pending = PendingGuard(&coordinator);
            match catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(())) => debug!(task = %id, "task finished"),
                Ok(Err(error)) => coordinator.record_failure(id, error),
                Err(payload) => {
                    let error = task_panicked(&panic_message(payload.as_ref()));
                    coordinator.record_failure(id, error);
                }
            }
        });
        id
    }

    fn record_failure(&self, task: TaskId, error: EvalError) {
        error!(task = %task, %error, "task failed");
        self.failures.lock().push(TaskFailure { task, error });
    }

    /// Tasks submitted and not yet finished.
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Wait for outstanding tasks, reporting progress every drain poll
    /// interval and giving up after the drain timeout, if any.
    ///
    /// Marks the coordinator closed on return.
    pub fn drain(&self) -> DrainStatus {
        let started = Instant::now();
        let interval = self.config.drain_poll_interval;
        let mut pending = self.pending.lock();
        let status = loop {
            if *pending == 0 {
                break DrainStatus::Complete;
            }
            let elapsed = started.elapsed();
            let slice = match self.config.drain_timeout {
                Some(limit) if elapsed >= limit => {
                    break DrainStatus::Incomplete { pending: *pending };
                }
                Some(limit) => interval.min(limit - elapsed),
                None => interval,
            };
            if self.idle.wait_for(&mut pending, slice).timed_out() && *pending > 0 {
                debug!(pending = *pending, "draining tasks");
            }
        };
        drop(pending);

        self.closed.store(true, Ordering::Release);
        match status {
            DrainStatus::Complete => debug!("all tasks finished"),
            DrainStatus::Incomplete { pending } => {
                warn!(pending, "drain timed out with tasks still running");
            }
        }
        status
    }

    /// Whether the run has ended. Tasks left over after an incomplete
    /// drain use this to stop waiting.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Take the failures recorded so far.
    pub fn take_failures(&self) -> Vec<TaskFailure> {
        std::mem::take(&mut *self.failures.lock())
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("pending", &self.pending())
            .field("protect_sites", &self.protect_sites.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Decrements the pending count when a task ends, however it ends.
struct PendingGuard<'a>(&'a Coordinator);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.0.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.0.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}
