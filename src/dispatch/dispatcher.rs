//! The dispatcher facade

use super::config::DispatcherConfig;
use super::worker::{Worker, WorkerStats};
use crate::core::{BoxedTask, Class, ClosureTask, DispatchError, Result, Task};
use crate::queue::TaskQueue;
use crate::timer::{ScheduleHandle, Timer};
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of a dispatcher's counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Tasks accepted by the queue (every class, including timer firings)
    pub submitted: u64,
    /// Tasks that ran to completion
    pub executed: u64,
    /// Tasks that returned an error
    pub failed: u64,
    /// Tasks that panicked
    pub panicked: u64,
    /// Entries evicted by the `DropOldest` overflow policy
    pub dropped: u64,
    /// Entries discarded by an abrupt shutdown
    pub discarded: u64,
    /// Worker threads currently running
    pub live_workers: usize,
}

/// A named task dispatcher: a worker pool, a priority-aware queue, and an
/// interval timer behind one facade.
///
/// All submission flavors share one synchronized queue. Prioritized work
/// always runs before FIFO work; sustained prioritized traffic therefore
/// starves the FIFO backlog, which is the intended contract.
///
/// # Example
///
/// ```rust
/// use dispatch_queue::dispatch::Dispatcher;
///
/// # fn main() -> dispatch_queue::core::Result<()> {
/// let dispatcher = Dispatcher::with_threads("encode", 4)?;
///
/// for i in 0..10 {
///     dispatcher.dispatch_fn(move || {
///         println!("task {} executing", i);
///         Ok(())
///     })?;
/// }
///
/// // Urgent work jumps the FIFO backlog; rank 0 runs soonest
/// dispatcher.dispatch_fn_with_priority(|| Ok(()), 0)?;
///
/// dispatcher.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: Arc<TaskQueue>,
    workers: RwLock<Vec<Worker>>,
    worker_stats: Vec<Arc<WorkerStats>>,
    timer: Mutex<Option<Timer>>,
    live_workers: Arc<AtomicUsize>,
    discarded: AtomicU64,
    down: AtomicBool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("pending", &self.queue.len())
            .field("live_workers", &self.live_workers.load(Ordering::SeqCst))
            .field("down", &self.down.load(Ordering::Relaxed))
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with one worker thread
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        Self::with_config(DispatcherConfig::new(name))
    }

    /// Create a dispatcher with the given number of worker threads
    pub fn with_threads<S: Into<String>>(name: S, thread_count: usize) -> Result<Self> {
        Self::with_config(DispatcherConfig::new(name).with_threads(thread_count))
    }

    /// Create a dispatcher from a full configuration.
    ///
    /// Worker threads and the timer thread start eagerly; there is no
    /// separate start step and no restart after shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConfig`] when validation fails and
    /// [`DispatchError::SpawnError`] when an OS thread cannot be created;
    /// in the latter case every thread spawned so far is torn down again.
    pub fn with_config(config: DispatcherConfig) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(TaskQueue::new(config.name.clone(), config.overflow));
        let mut timer = Some(Timer::spawn(Arc::clone(&queue))?);

        let live_workers = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(config.thread_count);
        for id in 0..config.thread_count {
            match Worker::spawn(id, &config.name, Arc::clone(&queue), Arc::clone(&live_workers)) {
                Ok(worker) => {
                    debug!("dispatcher '{}' spawned worker {}", config.name, worker.id());
                    workers.push(worker);
                }
                Err(e) => {
                    // Unwind the partial construction before reporting
                    if let Some(mut timer) = timer.take() {
                        let _ = timer.shutdown();
                    }
                    queue.close_now();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(e);
                }
            }
        }

        let worker_stats = workers.iter().map(Worker::stats).collect();

        info!(
            "dispatcher '{}' started with {} worker(s)",
            config.name, config.thread_count
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_dispatcher_start(&config.name, config.thread_count);

        Ok(Self {
            config,
            queue,
            workers: RwLock::new(workers),
            worker_stats,
            timer: Mutex::new(timer),
            live_workers,
            discarded: AtomicU64::new(0),
            down: AtomicBool::new(false),
        })
    }

    /// Submit a task for FIFO execution.
    ///
    /// FIFO tasks execute in submission order relative to each other, after
    /// any pending prioritized work.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] once shutdown has begun, and
    /// [`DispatchError::QueueFull`] under a rejecting overflow policy at
    /// capacity.
    pub fn dispatch<T: Task + 'static>(&self, task: T) -> Result<()> {
        self.push(Class::Fifo, Box::new(task))
    }

    /// Submit a task for prioritized execution.
    ///
    /// Rank 0 runs soonest, 255 latest within the prioritized band; every
    /// prioritized task runs before every FIFO task. Equal ranks execute in
    /// submission order.
    pub fn dispatch_with_priority<T: Task + 'static>(&self, task: T, rank: u8) -> Result<()> {
        self.push(Class::Prioritized { rank }, Box::new(task))
    }

    /// Submit a closure for FIFO execution
    pub fn dispatch_fn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.push(Class::Fifo, Box::new(ClosureTask::new(f)))
    }

    /// Submit a closure for prioritized execution
    pub fn dispatch_fn_with_priority<F>(&self, f: F, rank: u8) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.push(Class::Prioritized { rank }, Box::new(ClosureTask::new(f)))
    }

    fn push(&self, class: Class, task: BoxedTask) -> Result<()> {
        self.queue.push(class, task)?;
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_submission(class, self.queue.len());
        Ok(())
    }

    /// Run a closure repeatedly on a fixed interval.
    ///
    /// The first firing is immediate; each subsequent deadline is the
    /// previous deadline plus `interval`, so cadence does not drift with
    /// execution time. Every firing enqueues one FIFO task, visible to
    /// [`empty`](Self::empty) like any other FIFO submission. An interval
    /// of zero is accepted and re-submits as fast as the timer loop can go.
    ///
    /// The returned handle cancels future firings; a firing already queued
    /// still executes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::QueueClosed`] once shutdown has begun.
    pub fn schedule_on_interval<F>(&self, task: F, interval: Duration) -> Result<ScheduleHandle>
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let task = Arc::new(task);
        self.schedule_task_on_interval(
            move || {
                let task = Arc::clone(&task);
                Box::new(ClosureTask::with_name(move || (*task)(), "recurring")) as BoxedTask
            },
            interval,
        )
    }

    /// Run factory-produced tasks repeatedly on a fixed interval.
    ///
    /// The factory is invoked once per firing. Semantics are otherwise
    /// those of [`schedule_on_interval`](Self::schedule_on_interval).
    pub fn schedule_task_on_interval<F>(&self, factory: F, interval: Duration) -> Result<ScheduleHandle>
    where
        F: Fn() -> BoxedTask + Send + 'static,
    {
        match self.timer.lock().as_ref() {
            Some(timer) => timer.register(interval, Box::new(factory)),
            None => Err(DispatchError::queue_closed(self.queue.name())),
        }
    }

    /// True when no FIFO task is waiting.
    ///
    /// Prioritized backlog is deliberately invisible here: this returns
    /// `true` even while prioritized tasks are still pending. Callers that
    /// need the whole picture should use [`pending`](Self::pending).
    pub fn empty(&self) -> bool {
        self.queue.fifo_is_empty()
    }

    /// Number of tasks currently queued, across every class
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Dispatcher name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of worker threads the dispatcher was built with
    pub fn thread_count(&self) -> usize {
        self.config.thread_count
    }

    /// Snapshot of the dispatcher's counters.
    ///
    /// Counters from all workers are summed; the snapshot is not atomic
    /// across fields.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.queue.submitted(),
            executed: self
                .worker_stats
                .iter()
                .map(|s| s.get_tasks_executed())
                .sum(),
            failed: self.worker_stats.iter().map(|s| s.get_tasks_failed()).sum(),
            panicked: self
                .worker_stats
                .iter()
                .map(|s| s.get_tasks_panicked())
                .sum(),
            dropped: self.queue.dropped(),
            discarded: self.discarded.load(Ordering::Relaxed),
            live_workers: self.live_workers.load(Ordering::SeqCst),
        }
    }

    /// Shut down gracefully, draining the backlog.
    ///
    /// Stops the timer first so nothing new is produced, then closes the
    /// queue for submission, lets workers finish every queued task, and
    /// joins all owned threads. Blocks until the last thread has exited.
    /// Idempotent: a second call returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::JoinError`] if an owned thread panicked.
    pub fn shutdown(&self) -> Result<()> {
        if self.down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!("dispatcher '{}' shutting down (drain)", self.config.name);

        if let Some(mut timer) = self.timer.lock().take() {
            timer.shutdown()?;
        }

        self.queue.close_drain();

        let workers = std::mem::take(&mut *self.workers.write());
        for worker in workers {
            worker.join()?;
        }

        info!("dispatcher '{}' shutdown complete", self.config.name);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_dispatcher_shutdown(
            self.stats().executed,
            self.stats().failed,
        );

        Ok(())
    }

    /// Shut down abruptly, discarding the backlog.
    ///
    /// Tasks already executing finish; tasks still queued are discarded and
    /// counted. Returns the number of discarded tasks. Blocks until every
    /// owned thread has exited. Idempotent: a second call returns `Ok(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::JoinError`] if an owned thread panicked.
    pub fn shutdown_now(&self) -> Result<usize> {
        if self.down.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }

        info!("dispatcher '{}' shutting down (abrupt)", self.config.name);

        if let Some(mut timer) = self.timer.lock().take() {
            timer.shutdown()?;
        }

        let discarded = self.queue.close_now();
        self.discarded.fetch_add(discarded as u64, Ordering::Relaxed);
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_discard(discarded);
        if discarded > 0 {
            info!(
                "dispatcher '{}' discarded {} queued task(s)",
                self.config.name, discarded
            );
        }

        let workers = std::mem::take(&mut *self.workers.write());
        for worker in workers {
            worker.join()?;
        }

        info!("dispatcher '{}' shutdown complete", self.config.name);
        Ok(discarded)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.down.load(Ordering::Acquire) {
            if let Err(e) = self.shutdown() {
                error!(
                    "failed to shut down dispatcher '{}' during drop: {}",
                    self.config.name, e
                );
            }
        }
    }
}
